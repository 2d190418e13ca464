//! ElementFinder: one resolution attempt against the live document.
//!
//! A call makes exactly one driver round trip, filters the raw matches by
//! visibility and text, removes duplicate handles, then applies the
//! disambiguation policy of [`Options::match_strategy`]. There is no retrying
//! here; callers wrap finder calls in the retry engine.

use std::collections::HashSet;
use tracing::trace;

use crate::driver::{Driver, ElementHandle};
use crate::locator::{Locator, Selector, TextFilter};
use crate::options::{Match, Options, Preference};
use crate::result::{PatienceError, PatienceResult};

/// Resolves a locator within an optional parent scope
#[derive(Debug, Clone, Copy)]
pub struct ElementFinder<'a> {
    locator: &'a Locator,
    options: &'a Options,
    scope: Option<&'a ElementHandle>,
}

impl<'a> ElementFinder<'a> {
    /// Create a finder for `locator` inside `scope` (`None` = document)
    #[must_use]
    pub const fn new(
        locator: &'a Locator,
        options: &'a Options,
        scope: Option<&'a ElementHandle>,
    ) -> Self {
        Self {
            locator,
            options,
            scope,
        }
    }

    /// The locator being resolved
    #[must_use]
    pub const fn locator(&self) -> &Locator {
        self.locator
    }

    /// One driver round trip, filtered but not disambiguated
    pub fn candidates(&self, driver: &dyn Driver) -> PatienceResult<Vec<ElementHandle>> {
        let raw = if self.locator.is_window() {
            driver.find_windows(self.locator, self.scope, self.options)?
        } else {
            driver.find_all(self.locator, self.scope, self.options)?
        };
        let raw_count = raw.len();
        let candidates = filter_candidates(raw, self.locator, self.options);
        trace!(
            locator = %self.locator,
            raw = raw_count,
            candidates = candidates.len(),
            "resolution attempt"
        );
        Ok(candidates)
    }

    /// Resolve to exactly one handle or fail with `NotFound`/`Ambiguous`
    pub fn find(&self, driver: &dyn Driver) -> PatienceResult<ElementHandle> {
        let candidates = self.candidates(driver)?;
        disambiguate(candidates, self.locator, self.options)
    }

    /// Whether at least one element currently matches; never ambiguous
    pub fn exists(&self, driver: &dyn Driver) -> PatienceResult<bool> {
        Ok(!self.candidates(driver)?.is_empty())
    }
}

/// Apply visibility and text filters, drop duplicate handles, keep order
#[must_use]
pub fn filter_candidates(
    raw: Vec<ElementHandle>,
    locator: &Locator,
    options: &Options,
) -> Vec<ElementHandle> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .filter(|e| options.consider_invisible_elements || e.visible)
        .filter(|e| match locator.text_filter() {
            Some(filter) => filter.matches(e.text(), options.text_precision),
            None => true,
        })
        .filter(|e| seen.insert(e.id.clone()))
        .collect()
}

/// Reduce filtered candidates to one handle according to the match strategy
pub fn disambiguate(
    mut candidates: Vec<ElementHandle>,
    locator: &Locator,
    options: &Options,
) -> PatienceResult<ElementHandle> {
    match candidates.len() {
        0 => return Err(PatienceError::not_found(locator.description())),
        1 => return Ok(candidates.remove(0)),
        _ => {}
    }

    if options.match_strategy == Match::First {
        return Ok(candidates.remove(0));
    }

    let exact_target = exact_text_target(locator);
    for preference in options.match_strategy.preferences() {
        let preferred: Vec<ElementHandle> = candidates
            .iter()
            .filter(|e| prefers(&preference, e, exact_target.as_ref()))
            .cloned()
            .collect();
        if !preferred.is_empty() {
            candidates = preferred;
        }
        if candidates.len() == 1 {
            return Ok(candidates.remove(0));
        }
    }

    Err(PatienceError::ambiguous(
        locator.description(),
        candidates.len(),
    ))
}

/// Text an exact-match preference compares against.
///
/// An explicit text filter wins; text-addressed selectors fall back to their
/// own pattern.
fn exact_text_target(locator: &Locator) -> Option<TextFilter> {
    if let Some(filter) = locator.text_filter() {
        return Some(filter.clone());
    }
    match locator.selector() {
        Selector::Button(text)
        | Selector::Link(text)
        | Selector::Section(text)
        | Selector::Fieldset(text)
        | Selector::Window(text) => Some(TextFilter::Text(text.clone())),
        Selector::Css(_)
        | Selector::XPath(_)
        | Selector::Id(_)
        | Selector::IdEndingWith(_)
        | Selector::Field(_)
        | Selector::Frame(_) => None,
    }
}

fn prefers(preference: &Preference, element: &ElementHandle, exact: Option<&TextFilter>) -> bool {
    match preference {
        Preference::ExactText => exact.is_some_and(|target| target.matches_exactly(element.text())),
        Preference::Visible => element.visible,
        Preference::Enabled => !element.disabled,
        Preference::Attribute { name, value } => element.attribute(name) == Some(value.as_str()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::driver::MockDriver;
    use crate::options::TextPrecision;
    use crate::result::FailureKind;

    fn el(id: &str, text: &str) -> ElementHandle {
        ElementHandle::new(id, "button").with_text(text)
    }

    mod filter_tests {
        use super::*;

        #[test]
        fn test_hidden_elements_dropped_by_default() {
            let raw = vec![el("a", "Go").hidden(), el("b", "Go")];
            let kept = filter_candidates(raw, &Locator::css("button"), &Options::default());
            assert_eq!(kept.len(), 1);
            assert_eq!(kept[0].id, "b");
        }

        #[test]
        fn test_hidden_elements_kept_when_considered() {
            let raw = vec![el("a", "Go").hidden(), el("b", "Go")];
            let options = Options::default().with_consider_invisible(true);
            let kept = filter_candidates(raw, &Locator::css("button"), &options);
            assert_eq!(kept.len(), 2);
        }

        #[test]
        fn test_text_filter_applied() {
            let raw = vec![el("a", "Save"), el("b", "Cancel")];
            let locator = Locator::css("button").with_text("Save");
            let kept = filter_candidates(raw, &locator, &Options::default());
            assert_eq!(kept.len(), 1);
            assert_eq!(kept[0].id, "a");
        }

        #[test]
        fn test_duplicate_handles_collapse() {
            let raw = vec![el("a", "Go"), el("a", "Go")];
            let kept = filter_candidates(raw, &Locator::css("button"), &Options::default());
            assert_eq!(kept.len(), 1);
        }
    }

    mod disambiguation_tests {
        use super::*;

        #[test]
        fn test_zero_is_not_found() {
            let err = disambiguate(vec![], &Locator::css("#x"), &Options::default()).unwrap_err();
            assert_eq!(err.kind(), FailureKind::NotFound);
            assert_eq!(err.to_string(), "Unable to find css: #x");
        }

        #[test]
        fn test_window_not_found_message() {
            let locator = Locator::window("Help");
            let err = disambiguate(vec![], &locator, &Options::default()).unwrap_err();
            assert_eq!(err.to_string(), "Unable to find window: Help");
        }

        #[test]
        fn test_first_takes_document_order() {
            let options = Options::default().with_match(Match::First);
            let candidates = vec![el("a", "1"), el("b", "2")];
            let found = disambiguate(candidates, &Locator::css("li"), &options).unwrap();
            assert_eq!(found.id, "a");
        }

        #[test]
        fn test_single_is_ambiguous() {
            let options = Options::default().with_match(Match::Single);
            let candidates = vec![el("a", "Go"), el("b", "Go")];
            let err = disambiguate(candidates, &Locator::css("b"), &options).unwrap_err();
            assert!(matches!(err, PatienceError::Ambiguous { count: 2, .. }));
        }

        #[test]
        fn test_smart_prefers_exact_text() {
            let locator = Locator::css("button").with_text("Save");
            let candidates = vec![el("a", "Save draft"), el("b", "Save")];
            let found = disambiguate(candidates, &locator, &Options::default()).unwrap();
            assert_eq!(found.id, "b");
        }

        #[test]
        fn test_smart_uses_button_pattern_as_text() {
            let locator = Locator::button("Go");
            let candidates = vec![el("a", "Go back"), el("b", "Go")];
            let found = disambiguate(candidates, &locator, &Options::default()).unwrap();
            assert_eq!(found.id, "b");
        }

        #[test]
        fn test_smart_two_exact_is_ambiguous() {
            let locator = Locator::css("button").with_text("Save");
            let candidates = vec![el("a", "Save"), el("b", "Save"), el("c", "Save all")];
            let err = disambiguate(candidates, &locator, &Options::default()).unwrap_err();
            assert!(matches!(err, PatienceError::Ambiguous { count: 2, .. }));
        }

        #[test]
        fn test_smart_without_text_is_single() {
            let err = disambiguate(
                vec![el("a", "x"), el("b", "y")],
                &Locator::css("div"),
                &Options::default(),
            )
            .unwrap_err();
            assert_eq!(err.kind(), FailureKind::Ambiguous);
        }

        #[test]
        fn test_prefer_order_applies_in_sequence() {
            let options = Options::default()
                .with_consider_invisible(true)
                .with_match(Match::Prefer(vec![
                    Preference::Visible,
                    Preference::Enabled,
                ]));
            let candidates = vec![
                el("a", "Pay").hidden(),
                el("b", "Pay").disabled(),
                el("c", "Pay"),
            ];
            let found = disambiguate(candidates, &Locator::css("button"), &options).unwrap();
            assert_eq!(found.id, "c");
        }

        #[test]
        fn test_prefer_attribute() {
            let options = Options::default().with_match(Match::Prefer(vec![Preference::Attribute {
                name: "type".into(),
                value: "submit".into(),
            }]));
            let candidates = vec![
                el("a", "Go").with_attribute("type", "button"),
                el("b", "Go").with_attribute("type", "submit"),
            ];
            let found = disambiguate(candidates, &Locator::css("button"), &options).unwrap();
            assert_eq!(found.id, "b");
        }

        #[test]
        fn test_prefer_falls_back_to_single() {
            let options = Options::default().with_match(Match::Prefer(vec![Preference::Enabled]));
            let candidates = vec![el("a", "x"), el("b", "y")];
            let err = disambiguate(candidates, &Locator::css("i"), &options).unwrap_err();
            assert_eq!(err.kind(), FailureKind::Ambiguous);
        }

        #[test]
        fn test_exact_precision_filters_before_disambiguation() {
            let locator = Locator::css("button").with_text("Save");
            let options = Options::default()
                .with_text_precision(TextPrecision::Exact)
                .with_match(Match::Single);
            let raw = vec![el("a", "Save draft"), el("b", "Save")];
            let kept = filter_candidates(raw, &locator, &options);
            let found = disambiguate(kept, &locator, &options).unwrap();
            assert_eq!(found.id, "b");
        }
    }

    mod finder_tests {
        use super::*;

        #[test]
        fn test_finder_single_round_trip() {
            let driver = MockDriver::new();
            let locator = Locator::css("#go");
            driver.on_find(&locator, vec![el("go", "Go")]);
            let options = Options::default();
            let found = ElementFinder::new(&locator, &options, None)
                .find(&driver)
                .unwrap();
            assert_eq!(found.id, "go");
            assert_eq!(driver.find_calls(&locator), 1);
        }

        #[test]
        fn test_finder_exists_ignores_ambiguity() {
            let driver = MockDriver::new();
            let locator = Locator::css("li");
            driver.on_find(&locator, vec![el("a", "1"), el("b", "2")]);
            let options = Options::default().with_match(Match::Single);
            assert!(ElementFinder::new(&locator, &options, None)
                .exists(&driver)
                .unwrap());
        }

        #[test]
        fn test_finder_windows_use_window_lookup() {
            let driver = MockDriver::new();
            let locator = Locator::window("Popup");
            driver.on_find(
                &locator,
                vec![ElementHandle::new("w2", "window").with_text("Popup")],
            );
            let options = Options::default();
            let found = ElementFinder::new(&locator, &options, None)
                .find(&driver)
                .unwrap();
            assert_eq!(found.id, "w2");
        }

        #[test]
        fn test_finder_propagates_driver_fault() {
            let driver = MockDriver::new();
            let locator = Locator::css("#go");
            driver.on_find_fault(&locator, crate::driver::MockFault::Driver("boom".into()));
            let options = Options::default();
            let err = ElementFinder::new(&locator, &options, None)
                .find(&driver)
                .unwrap_err();
            assert_eq!(err.kind(), FailureKind::Driver);
        }
    }
}
