//! Scopes: where lookups happen and how actions re-resolve.
//!
//! A [`DriverScope`] is anything elements can be found inside: the
//! [`Session`] (the whole document), an [`ElementScope`] (a lazily resolved
//! element) or a [`SnapshotElementScope`]. Scopes never cache handles. Every
//! attempt resolves the whole parent chain fresh, so a stale handle
//! anywhere in the chain is healed by the next attempt.
//!
//! ```text
//! Session ──find_css──► ElementScope ──find_button──► ElementScope
//!    │                       │                             │
//!    └── resolve_once: None  └── resolve_once: chain ──────┘
//! ```

use regex::Regex;
use std::fmt;
use std::time::Duration;
use tracing::trace;

use crate::driver::{Driver, ElementHandle};
use crate::finder::ElementFinder;
use crate::locator::{Locator, TextFilter};
use crate::options::{Options, Overrides};
use crate::query::{ContentQuery, FnQuery, PresenceQuery, Query, ValueQuery};
use crate::result::{PatienceError, PatienceResult};
use crate::retry::RetryEngine;
use crate::session::Session;
use crate::snapshot::SnapshotElementScope;
use crate::state::{self, State};

/// Predicate over the current results of a `find_all` call
pub type AllPredicate<'p> = &'p dyn Fn(&[SnapshotElementScope<'_>]) -> bool;

/// A place in the document where lookups and actions happen.
///
/// Required methods describe the scope; everything else is provided and
/// runs through the session's retry engine with options merged from this
/// scope's options and the call's [`Overrides`].
///
/// `check`/`uncheck` exist both here (by locator) and on [`ElementScope`]
/// (on the element itself); call `DriverScope::check(&element, ..)` to
/// reach a checkbox nested in an element scope.
pub trait DriverScope {
    /// The session this scope belongs to
    fn session(&self) -> &Session;

    /// Options every lookup in this scope starts from
    fn scope_options(&self) -> &Options;

    /// Resolve this scope once, without retrying.
    ///
    /// `None` means the current document.
    fn resolve_once(&self) -> PatienceResult<Option<ElementHandle>>;

    /// Description used in logs and failures
    fn describe(&self) -> String;

    /// Driver of the owning session
    fn driver(&self) -> &dyn Driver {
        self.session().driver()
    }

    /// Retry engine of the owning session
    fn engine(&self) -> &RetryEngine {
        self.session().engine()
    }

    /// This scope's options with `overrides` applied
    fn merged(&self, overrides: &Overrides) -> Options {
        self.scope_options().merge(overrides)
    }

    // -------------------------------------------------------------------------
    // Finding
    // -------------------------------------------------------------------------

    /// Lazily find one element matching `locator`
    fn find(&self, locator: Locator, overrides: &Overrides) -> ElementScope<'_>
    where
        Self: Sized,
    {
        ElementScope::new(self, locator, self.merged(overrides))
    }

    /// Find by CSS selector
    fn find_css(&self, css: &str, overrides: &Overrides) -> ElementScope<'_>
    where
        Self: Sized,
    {
        self.find(Locator::css(css), overrides)
    }

    /// Find by CSS selector and text
    fn find_css_with_text(&self, css: &str, text: &str, overrides: &Overrides) -> ElementScope<'_>
    where
        Self: Sized,
    {
        self.find(Locator::css(css).with_text(text), overrides)
    }

    /// Find by CSS selector and a text pattern
    fn find_css_matching(&self, css: &str, text: Regex, overrides: &Overrides) -> ElementScope<'_>
    where
        Self: Sized,
    {
        self.find(Locator::css(css).with_text_matching(text), overrides)
    }

    /// Find by XPath
    fn find_xpath(&self, xpath: &str, overrides: &Overrides) -> ElementScope<'_>
    where
        Self: Sized,
    {
        self.find(Locator::xpath(xpath), overrides)
    }

    /// Find by XPath and text
    fn find_xpath_with_text(
        &self,
        xpath: &str,
        text: &str,
        overrides: &Overrides,
    ) -> ElementScope<'_>
    where
        Self: Sized,
    {
        self.find(Locator::xpath(xpath).with_text(text), overrides)
    }

    /// Find by XPath and a text pattern
    fn find_xpath_matching(
        &self,
        xpath: &str,
        text: Regex,
        overrides: &Overrides,
    ) -> ElementScope<'_>
    where
        Self: Sized,
    {
        self.find(Locator::xpath(xpath).with_text_matching(text), overrides)
    }

    /// Find by exact id
    fn find_id(&self, id: &str, overrides: &Overrides) -> ElementScope<'_>
    where
        Self: Sized,
    {
        self.find(Locator::id(id), overrides)
    }

    /// Find by id suffix, for generated id prefixes
    fn find_id_ending_with(&self, suffix: &str, overrides: &Overrides) -> ElementScope<'_>
    where
        Self: Sized,
    {
        self.find(Locator::id_ending_with(suffix), overrides)
    }

    /// Find a button by text, value, name or id
    fn find_button(&self, locator: &str, overrides: &Overrides) -> ElementScope<'_>
    where
        Self: Sized,
    {
        self.find(Locator::button(locator), overrides)
    }

    /// Find a link by text
    fn find_link(&self, locator: &str, overrides: &Overrides) -> ElementScope<'_>
    where
        Self: Sized,
    {
        self.find(Locator::link(locator), overrides)
    }

    /// Find a form field by label, name, id or placeholder
    fn find_field(&self, locator: &str, overrides: &Overrides) -> ElementScope<'_>
    where
        Self: Sized,
    {
        self.find(Locator::field(locator), overrides)
    }

    /// Find a section by heading text
    fn find_section(&self, heading: &str, overrides: &Overrides) -> ElementScope<'_>
    where
        Self: Sized,
    {
        self.find(Locator::section(heading), overrides)
    }

    /// Find a fieldset by legend text
    fn find_fieldset(&self, legend: &str, overrides: &Overrides) -> ElementScope<'_>
    where
        Self: Sized,
    {
        self.find(Locator::fieldset(legend), overrides)
    }

    /// Find a frame element by name, id or title
    fn find_frame(&self, locator: &str, overrides: &Overrides) -> ElementScope<'_>
    where
        Self: Sized,
    {
        self.find(Locator::frame(locator), overrides)
    }

    /// Find a window by name or title
    fn find_window(&self, locator: &str, overrides: &Overrides) -> ElementScope<'_>
    where
        Self: Sized,
    {
        self.find(Locator::window(locator), overrides)
    }

    /// Find every element matching `locator`.
    ///
    /// Without a predicate the first successful round trip is returned, even
    /// when empty. With one, lookups repeat until the predicate accepts the
    /// results; on timeout this fails with `NotFound`.
    fn find_all(
        &self,
        locator: Locator,
        predicate: Option<AllPredicate<'_>>,
        overrides: &Overrides,
    ) -> PatienceResult<Vec<SnapshotElementScope<'_>>>
    where
        Self: Sized,
    {
        let options = self.merged(overrides);
        let find = || find_all_once(self, &locator, predicate, &options);
        self.engine().retry_until_timeout(find, &options)
    }

    /// Find every element matching a CSS selector
    fn find_all_css(
        &self,
        css: &str,
        predicate: Option<AllPredicate<'_>>,
        overrides: &Overrides,
    ) -> PatienceResult<Vec<SnapshotElementScope<'_>>>
    where
        Self: Sized,
    {
        self.find_all(Locator::css(css), predicate, overrides)
    }

    /// Find every element matching an XPath
    fn find_all_xpath(
        &self,
        xpath: &str,
        predicate: Option<AllPredicate<'_>>,
        overrides: &Overrides,
    ) -> PatienceResult<Vec<SnapshotElementScope<'_>>>
    where
        Self: Sized,
    {
        self.find_all(Locator::xpath(xpath), predicate, overrides)
    }

    // -------------------------------------------------------------------------
    // Acting
    // -------------------------------------------------------------------------

    /// Click a button
    fn click_button(&self, locator: &str, overrides: &Overrides) -> PatienceResult<ElementScope<'_>>
    where
        Self: Sized,
    {
        let button = self.find_button(locator, overrides);
        button.click()?;
        Ok(button)
    }

    /// Click a link
    fn click_link(&self, locator: &str, overrides: &Overrides) -> PatienceResult<ElementScope<'_>>
    where
        Self: Sized,
    {
        let link = self.find_link(locator, overrides);
        link.click()?;
        Ok(link)
    }

    /// Click a button, then wait up to `wait_before_retry` for `until`,
    /// clicking again until it holds or the timeout elapses
    fn click_button_until(
        &self,
        locator: &str,
        until: impl FnMut() -> PatienceResult<bool>,
        wait_before_retry: Duration,
        overrides: &Overrides,
    ) -> PatienceResult<()>
    where
        Self: Sized,
    {
        let button = self.find_button(locator, overrides);
        let click = || button.click_once();
        self.engine()
            .try_until(click, until, wait_before_retry, button.options())
    }

    /// Click a link, then wait up to `wait_before_retry` for `until`,
    /// clicking again until it holds or the timeout elapses
    fn click_link_until(
        &self,
        locator: &str,
        until: impl FnMut() -> PatienceResult<bool>,
        wait_before_retry: Duration,
        overrides: &Overrides,
    ) -> PatienceResult<()>
    where
        Self: Sized,
    {
        let link = self.find_link(locator, overrides);
        let click = || link.click_once();
        self.engine()
            .try_until(click, until, wait_before_retry, link.options())
    }

    /// Start filling in a field: `scope.fill_in("Email").with("ada@example.com")`
    fn fill_in(&self, locator: &str) -> FillInWith<'_>
    where
        Self: Sized,
    {
        FillInWith {
            scope: self,
            locator: Locator::field(locator),
            overrides: Overrides::none(),
        }
    }

    /// Start selecting an option: `scope.select("Blue").from("Colour")`
    fn select(&self, option: &str) -> SelectFrom<'_>
    where
        Self: Sized,
    {
        SelectFrom {
            scope: self,
            option: option.to_string(),
            overrides: Overrides::none(),
        }
    }

    /// Tick a checkbox
    fn check(&self, locator: &str, overrides: &Overrides) -> PatienceResult<()>
    where
        Self: Sized,
    {
        self.find_field(locator, overrides).check().map(|_| ())
    }

    /// Untick a checkbox
    fn uncheck(&self, locator: &str, overrides: &Overrides) -> PatienceResult<()>
    where
        Self: Sized,
    {
        self.find_field(locator, overrides).uncheck().map(|_| ())
    }

    /// Choose a radio button
    fn choose(&self, locator: &str, overrides: &Overrides) -> PatienceResult<()>
    where
        Self: Sized,
    {
        self.find_field(locator, overrides).check().map(|_| ())
    }

    // -------------------------------------------------------------------------
    // Content
    // -------------------------------------------------------------------------

    /// Wait for text to appear in this scope; `false` if it never does
    fn has_content(&self, text: &str, overrides: &Overrides) -> PatienceResult<bool>
    where
        Self: Sized,
    {
        let query = ContentQuery::new(
            self,
            TextFilter::Text(text.to_string()),
            true,
            self.merged(overrides),
        );
        self.engine().run_query(&query)
    }

    /// Wait for a pattern to match this scope's text
    fn has_content_match(&self, pattern: Regex, overrides: &Overrides) -> PatienceResult<bool>
    where
        Self: Sized,
    {
        let query = ContentQuery::new(
            self,
            TextFilter::Pattern(pattern),
            true,
            self.merged(overrides),
        );
        self.engine().run_query(&query)
    }

    /// Wait for text to disappear from this scope; `false` if it stays
    fn has_no_content(&self, text: &str, overrides: &Overrides) -> PatienceResult<bool>
    where
        Self: Sized,
    {
        let query = ContentQuery::new(
            self,
            TextFilter::Text(text.to_string()),
            false,
            self.merged(overrides),
        );
        self.engine().run_query(&query)
    }

    /// Wait for a pattern to stop matching this scope's text
    fn has_no_content_match(&self, pattern: Regex, overrides: &Overrides) -> PatienceResult<bool>
    where
        Self: Sized,
    {
        let query = ContentQuery::new(
            self,
            TextFilter::Pattern(pattern),
            false,
            self.merged(overrides),
        );
        self.engine().run_query(&query)
    }

    // -------------------------------------------------------------------------
    // Waiting
    // -------------------------------------------------------------------------

    /// Retry arbitrary work with this scope's timing
    fn retry_until_timeout<T>(
        &self,
        work: impl FnMut() -> PatienceResult<T>,
        overrides: &Overrides,
    ) -> PatienceResult<T>
    where
        Self: Sized,
    {
        self.engine()
            .retry_until_timeout(work, &self.merged(overrides))
    }

    /// Poll a query until it yields its expected value
    fn query<T: PartialEq>(&self, query: &dyn Query<T>) -> PatienceResult<T>
    where
        Self: Sized,
    {
        self.engine().run_query(query)
    }

    /// Poll a closure until it yields `expected`
    fn query_fn<T: PartialEq>(
        &self,
        run: impl Fn() -> PatienceResult<T>,
        expected: T,
        overrides: &Overrides,
    ) -> PatienceResult<T>
    where
        Self: Sized,
    {
        let query = FnQuery::new(run, expected, self.merged(overrides));
        self.engine().run_query(&query)
    }

    /// Repeat `try_this` until `until` holds
    fn try_until(
        &self,
        try_this: impl FnMut() -> PatienceResult<()>,
        until: impl FnMut() -> PatienceResult<bool>,
        wait_before_retry: Duration,
        overrides: &Overrides,
    ) -> PatienceResult<()>
    where
        Self: Sized,
    {
        self.engine()
            .try_until(try_this, until, wait_before_retry, &self.merged(overrides))
    }

    /// Wait for the first of several page states to be reached
    fn find_state<'st, 'f>(
        &self,
        states: &'st [State<'f>],
        overrides: &Overrides,
    ) -> PatienceResult<&'st State<'f>>
    where
        Self: Sized,
    {
        state::find_state(self.engine(), states, &self.merged(overrides))
    }
}

fn find_all_once<'s>(
    scope: &'s dyn DriverScope,
    locator: &Locator,
    predicate: Option<AllPredicate<'_>>,
    options: &Options,
) -> PatienceResult<Vec<SnapshotElementScope<'s>>> {
    let parent = scope.resolve_once()?;
    let finder = ElementFinder::new(locator, options, parent.as_ref());
    let handles = finder.candidates(scope.driver())?;
    let snapshots = handles
        .into_iter()
        .map(|h| SnapshotElementScope::capture(scope, h, options))
        .collect::<PatienceResult<Vec<_>>>()?;
    match predicate {
        Some(accept) if !accept(snapshots.as_slice()) => Err(PatienceError::not_found(format!(
            "{locator} satisfying predicate ({} current matches)",
            snapshots.len()
        ))),
        _ => Ok(snapshots),
    }
}

// =============================================================================
// ELEMENT SCOPE
// =============================================================================

/// A lazily resolved element.
///
/// Holds only a parent scope and a locator. Nothing is looked up until an
/// action, property or [`ElementScope::now`] asks, and each of those
/// resolves the full chain fresh inside its own retry loop.
#[derive(Clone)]
pub struct ElementScope<'s> {
    parent: &'s dyn DriverScope,
    locator: Locator,
    options: Options,
}

impl fmt::Debug for ElementScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementScope")
            .field("parent", &self.parent.describe())
            .field("locator", &self.locator)
            .field("options", &self.options)
            .finish()
    }
}

impl<'s> ElementScope<'s> {
    pub(crate) fn new(parent: &'s dyn DriverScope, locator: Locator, options: Options) -> Self {
        Self {
            parent,
            locator,
            options,
        }
    }

    /// The locator this scope resolves
    #[must_use]
    pub const fn locator(&self) -> &Locator {
        &self.locator
    }

    /// Options used by this scope's lookups and actions
    #[must_use]
    pub const fn options(&self) -> &Options {
        &self.options
    }

    /// Same element with further overrides applied
    #[must_use]
    pub fn with_overrides(self, overrides: &Overrides) -> Self {
        Self {
            options: self.options.merge(overrides),
            ..self
        }
    }

    /// One resolution of the full chain, no retrying
    pub fn find_once(&self) -> PatienceResult<ElementHandle> {
        let parent = self.parent.resolve_once()?;
        ElementFinder::new(&self.locator, &self.options, parent.as_ref()).find(self.driver())
    }

    pub(crate) fn exists_once(&self) -> PatienceResult<bool> {
        let parent = self.parent.resolve_once()?;
        ElementFinder::new(&self.locator, &self.options, parent.as_ref()).exists(self.driver())
    }

    /// Resolve now, retrying until found or the timeout elapses.
    ///
    /// The handle is only good until the document changes; do not hold it
    /// across calls.
    pub fn now(&self) -> PatienceResult<ElementHandle> {
        self.engine()
            .retry_until_timeout(|| self.find_once(), &self.options)
    }

    fn act(
        &self,
        action: &str,
        mut perform: impl FnMut(&dyn Driver, &ElementHandle) -> PatienceResult<()>,
    ) -> PatienceResult<&Self> {
        self.engine().retry_until_timeout(
            || {
                let handle = self.find_once()?;
                perform(self.driver(), &handle)
            },
            &self.options,
        )?;
        trace!(locator = %self.locator, action, "performed");
        Ok(self)
    }

    fn read<T>(
        &self,
        mut read: impl FnMut(&dyn Driver, &ElementHandle) -> PatienceResult<T>,
    ) -> PatienceResult<T> {
        self.engine().retry_until_timeout(
            || {
                let handle = self.find_once()?;
                read(self.driver(), &handle)
            },
            &self.options,
        )
    }

    pub(crate) fn click_once(&self) -> PatienceResult<()> {
        let handle = self.find_once()?;
        self.pause_before_click();
        self.driver().click(&handle)
    }

    fn pause_before_click(&self) {
        let pause = self.options.wait_before_click();
        if !pause.is_zero() {
            self.engine().clock().sleep(pause);
        }
    }

    /// Click, honouring `wait_before_click`
    pub fn click(&self) -> PatienceResult<&Self> {
        self.act("click", |driver, handle| {
            self.pause_before_click();
            driver.click(handle)
        })
    }

    /// Replace the field's value
    pub fn fill_in_with(&self, value: &str) -> PatienceResult<&Self> {
        self.act("fill_in", |driver, handle| driver.set_value(handle, value))
    }

    /// Choose an option of this select element
    pub fn select_option(&self, option: &str) -> PatienceResult<&Self> {
        self.act("select", |driver, handle| {
            driver.select_option(handle, option)
        })
    }

    /// Move the pointer over the element
    pub fn hover(&self) -> PatienceResult<&Self> {
        self.act("hover", |driver, handle| driver.hover(handle))
    }

    /// Send keystrokes to the element
    pub fn send_keys(&self, keys: &str) -> PatienceResult<&Self> {
        self.act("send_keys", |driver, handle| driver.send_keys(handle, keys))
    }

    /// Tick this checkbox or radio
    pub fn check(&self) -> PatienceResult<&Self> {
        self.act("check", |driver, handle| driver.set_checked(handle, true))
    }

    /// Untick this checkbox
    pub fn uncheck(&self) -> PatienceResult<&Self> {
        self.act("uncheck", |driver, handle| {
            driver.set_checked(handle, false)
        })
    }

    /// Live text
    pub fn text(&self) -> PatienceResult<String> {
        self.read(|driver, handle| driver.text(handle))
    }

    /// Live value
    pub fn value(&self) -> PatienceResult<String> {
        self.read(|driver, handle| driver.value(handle))
    }

    /// Live attribute
    pub fn attribute(&self, name: &str) -> PatienceResult<Option<String>> {
        self.read(|driver, handle| driver.attribute(handle, name))
    }

    /// `id` attribute, empty when absent
    pub fn id(&self) -> PatienceResult<String> {
        Ok(self.attribute("id")?.unwrap_or_default())
    }

    /// `name` attribute, empty when absent
    pub fn name(&self) -> PatienceResult<String> {
        Ok(self.attribute("name")?.unwrap_or_default())
    }

    /// Live markup including the element's own tag
    pub fn outer_html(&self) -> PatienceResult<String> {
        self.read(|driver, handle| driver.outer_html(handle))
    }

    /// Live markup of the element's children
    pub fn inner_html(&self) -> PatienceResult<String> {
        self.read(|driver, handle| driver.inner_html(handle))
    }

    /// Live title
    pub fn title(&self) -> PatienceResult<String> {
        self.read(|driver, handle| driver.title(handle))
    }

    /// Text of the option currently selected in this select element
    pub fn selected_option(&self) -> PatienceResult<String> {
        self.read(|driver, handle| driver.selected_option(handle))
    }

    /// Whether the element is selected or checked
    pub fn is_selected(&self) -> PatienceResult<bool> {
        self.read(|driver, handle| driver.is_selected(handle))
    }

    /// Whether the element is disabled
    pub fn is_disabled(&self) -> PatienceResult<bool> {
        self.read(|driver, handle| driver.is_disabled(handle))
    }

    /// Whether the resolved element is rendered visibly.
    ///
    /// Hidden elements only resolve when `consider_invisible_elements` is set.
    pub fn is_visible(&self) -> PatienceResult<bool> {
        self.read(|_, handle| Ok(handle.visible))
    }

    /// Wait for the element to exist; `false` if it never does
    pub fn exists(&self) -> PatienceResult<bool> {
        self.engine().run_query(&PresenceQuery::new(self, true))
    }

    /// Wait for the element to be gone; `false` if it stays
    pub fn missing(&self) -> PatienceResult<bool> {
        self.engine().run_query(&PresenceQuery::new(self, false))
    }

    /// Wait for the value to equal `value`
    pub fn has_value(&self, value: &str) -> PatienceResult<bool> {
        let query = ValueQuery::new(self, value, true);
        self.engine().run_query(&query)
    }

    /// Wait for the value to differ from `value`
    pub fn has_no_value(&self, value: &str) -> PatienceResult<bool> {
        let query = ValueQuery::new(self, value, false);
        self.engine().run_query(&query)
    }
}

impl DriverScope for ElementScope<'_> {
    fn session(&self) -> &Session {
        self.parent.session()
    }

    fn scope_options(&self) -> &Options {
        &self.options
    }

    fn resolve_once(&self) -> PatienceResult<Option<ElementHandle>> {
        self.find_once().map(Some)
    }

    fn describe(&self) -> String {
        format!("{} > {}", self.parent.describe(), self.locator)
    }
}

// =============================================================================
// BUILDERS
// =============================================================================

/// Pending `fill_in(..).with(..)`
#[must_use = "call .with(value) to fill the field"]
pub struct FillInWith<'s> {
    scope: &'s dyn DriverScope,
    locator: Locator,
    overrides: Overrides,
}

impl fmt::Debug for FillInWith<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FillInWith")
            .field("scope", &self.scope.describe())
            .field("locator", &self.locator)
            .field("overrides", &self.overrides)
            .finish()
    }
}

impl<'s> FillInWith<'s> {
    /// Apply call-site overrides
    pub fn overriding(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Fill the field with `value`
    pub fn with(self, value: &str) -> PatienceResult<ElementScope<'s>> {
        let options = self.scope.merged(&self.overrides);
        let field = ElementScope::new(self.scope, self.locator, options);
        field.fill_in_with(value)?;
        Ok(field)
    }
}

/// Pending `select(..).from(..)`
#[must_use = "call .from(field) to select the option"]
pub struct SelectFrom<'s> {
    scope: &'s dyn DriverScope,
    option: String,
    overrides: Overrides,
}

impl fmt::Debug for SelectFrom<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectFrom")
            .field("scope", &self.scope.describe())
            .field("option", &self.option)
            .field("overrides", &self.overrides)
            .finish()
    }
}

impl<'s> SelectFrom<'s> {
    /// Apply call-site overrides
    pub fn overriding(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Select the option in the field found by `locator`
    pub fn from(self, locator: &str) -> PatienceResult<ElementScope<'s>> {
        let options = self.scope.merged(&self.overrides);
        let field = ElementScope::new(self.scope, Locator::field(locator), options);
        field.select_option(&self.option)?;
        Ok(field)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::clock::{Clock, FakeClock};
    use crate::driver::{MockDriver, MockFault};
    use crate::options::Match;
    use crate::result::FailureKind;
    use std::cell::Cell;
    use std::sync::Arc;

    fn session(driver: &Arc<MockDriver>) -> (Session, Arc<FakeClock>) {
        let clock = Arc::new(FakeClock::new());
        let options = Options::default()
            .with_timeout(Duration::from_millis(300))
            .with_retry_interval(Duration::from_millis(50));
        (
            Session::with_clock(driver.clone(), options, clock.clone()),
            clock,
        )
    }

    fn none() -> Overrides {
        Overrides::none()
    }

    mod resolution_tests {
        use super::*;

        #[test]
        fn test_find_is_lazy() {
            let driver = Arc::new(MockDriver::new());
            let (session, _clock) = session(&driver);
            let _scope = session.find_css("#later", &none());
            assert_eq!(driver.find_calls(&Locator::css("#later")), 0);
        }

        #[test]
        fn test_now_waits_for_element() {
            let driver = Arc::new(MockDriver::new());
            let locator = Locator::css("#late");
            driver
                .on_find(&locator, vec![])
                .on_find(&locator, vec![ElementHandle::new("late", "div")]);
            let (session, clock) = session(&driver);
            let handle = session.find_css("#late", &none()).now().unwrap();
            assert_eq!(handle.id, "late");
            assert_eq!(clock.sleep_count(), 1);
        }

        #[test]
        fn test_now_times_out_with_not_found() {
            let driver = Arc::new(MockDriver::new());
            let (session, clock) = session(&driver);
            let err = session.find_css("#never", &none()).now().unwrap_err();
            assert_eq!(err.kind(), FailureKind::NotFound);
            assert!(clock.now() >= Duration::from_millis(300));
        }

        #[test]
        fn test_ambiguous_is_terminal_on_first_attempt() {
            let driver = Arc::new(MockDriver::new());
            let locator = Locator::button("Go");
            driver.on_find(
                &locator,
                vec![
                    ElementHandle::new("a", "button").with_text("Go"),
                    ElementHandle::new("b", "button").with_text("Go"),
                ],
            );
            let (session, clock) = session(&driver);
            let err = session
                .find_button("Go", &none().match_strategy(Match::Single))
                .now()
                .unwrap_err();
            assert_eq!(err.kind(), FailureKind::Ambiguous);
            assert_eq!(driver.find_calls(&locator), 1);
            assert_eq!(clock.sleep_count(), 0);
        }

        #[test]
        fn test_nested_scope_resolves_parent_each_attempt() {
            let driver = Arc::new(MockDriver::new());
            let form = Locator::css("form");
            let submit = Locator::button("Submit");
            let button = ElementHandle::new("s", "button").with_text("Submit");
            driver.on_find(&form, vec![ElementHandle::new("form", "form")]);
            driver
                .on_find(&submit, vec![])
                .on_find(&submit, vec![button]);
            let (session, _clock) = session(&driver);
            let form_scope = session.find_css("form", &none());
            form_scope.find_button("Submit", &none()).click().unwrap();
            assert_eq!(driver.find_calls(&form), 2);
            assert!(driver.was_called("click:s"));
        }

        #[test]
        fn test_missing_parent_is_not_found() {
            let driver = Arc::new(MockDriver::new());
            let (session, _clock) = session(&driver);
            let err = session
                .find_css("#panel", &none())
                .find_css("p", &none())
                .now()
                .unwrap_err();
            assert!(err.to_string().contains("#panel"));
        }

        #[test]
        fn test_with_overrides_applies_to_later_lookups() {
            let driver = Arc::new(MockDriver::new());
            driver.on_find(
                &Locator::css("#toast"),
                vec![ElementHandle::new("t", "div").hidden()],
            );
            let (session, _clock) = session(&driver);
            let toast = session
                .find_css("#toast", &none())
                .with_overrides(&none().consider_invisible(true));
            assert!(toast.scope_options().consider_invisible_elements);
            assert_eq!(toast.scope_options().timeout(), Duration::from_millis(300));
            assert_eq!(toast.now().unwrap().id, "t");
        }

        #[test]
        fn test_describe_shows_chain() {
            let driver = Arc::new(MockDriver::new());
            let (session, _clock) = session(&driver);
            let scope = session.find_css("form", &none());
            let nested = scope.find_field("Email", &none());
            assert_eq!(nested.describe(), "document > css: form > field: Email");
        }
    }

    mod action_tests {
        use super::*;

        #[test]
        fn test_stale_mid_action_re_resolves() {
            let driver = Arc::new(MockDriver::new());
            let locator = Locator::button("Save");
            let old = ElementHandle::new("old", "button").with_text("Save");
            let new = ElementHandle::new("new", "button").with_text("Save");
            driver
                .on_find(&locator, vec![old])
                .on_find(&locator, vec![new]);
            driver.fail_actions("old", vec![MockFault::Stale]);
            let (session, _clock) = session(&driver);
            session.click_button("Save", &none()).unwrap();
            assert_eq!(driver.find_calls(&locator), 2);
            assert!(driver.was_called("click:new"));
            assert!(!driver.was_called("click:old"));
        }

        #[test]
        fn test_wait_before_click_sleeps() {
            let driver = Arc::new(MockDriver::new());
            let locator = Locator::link("Next");
            driver.on_find(
                &locator,
                vec![ElementHandle::new("n", "a").with_text("Next")],
            );
            let (session, clock) = session(&driver);
            let overrides = none().wait_before_click(Duration::from_millis(120));
            session.click_link("Next", &overrides).unwrap();
            assert_eq!(clock.sleeps(), vec![Duration::from_millis(120)]);
        }

        #[test]
        fn test_fill_in_with() {
            let driver = Arc::new(MockDriver::new());
            driver.on_find(
                &Locator::field("Email"),
                vec![ElementHandle::new("email", "input")],
            );
            let (session, _clock) = session(&driver);
            let field = session.fill_in("Email").with("ada@example.com").unwrap();
            assert_eq!(field.value().unwrap(), "ada@example.com");
        }

        #[test]
        fn test_select_from() {
            let driver = Arc::new(MockDriver::new());
            driver.on_find(
                &Locator::field("Colour"),
                vec![ElementHandle::new("c", "select")],
            );
            let (session, _clock) = session(&driver);
            session.select("Blue").from("Colour").unwrap();
            assert!(driver.was_called("select:c=Blue"));
        }

        #[test]
        fn test_check_uncheck_choose() {
            let driver = Arc::new(MockDriver::new());
            driver.on_find(
                &Locator::field("Terms"),
                vec![ElementHandle::new("t", "input")],
            );
            driver.on_find(
                &Locator::field("Express"),
                vec![ElementHandle::new("x", "input")],
            );
            let (session, _clock) = session(&driver);
            session.check("Terms", &none()).unwrap();
            assert!(session.find_field("Terms", &none()).is_selected().unwrap());
            session.uncheck("Terms", &none()).unwrap();
            assert!(!session.find_field("Terms", &none()).is_selected().unwrap());
            session.choose("Express", &none()).unwrap();
            assert!(driver.was_called("check:x"));
        }

        #[test]
        fn test_hover_and_send_keys_chain() {
            let driver = Arc::new(MockDriver::new());
            driver.on_find(&Locator::id("q"), vec![ElementHandle::new("q", "input")]);
            let (session, _clock) = session(&driver);
            session
                .find_id("q", &none())
                .hover()
                .unwrap()
                .send_keys("rust")
                .unwrap();
            assert_eq!(
                driver.history(),
                vec!["hover:q".to_string(), "keys:q=rust".to_string()]
            );
        }

        #[test]
        fn test_click_button_until() {
            let driver = Arc::new(MockDriver::new());
            driver.on_find(
                &Locator::button("Refresh"),
                vec![ElementHandle::new("r", "button")],
            );
            let (session, _clock) = session(&driver);
            let clicks = Cell::new(0);
            session
                .click_button_until(
                    "Refresh",
                    || {
                        clicks.set(driver.history().len());
                        Ok(clicks.get() >= 2)
                    },
                    Duration::from_millis(50),
                    &none().timeout(Duration::from_secs(2)),
                )
                .unwrap();
            assert_eq!(clicks.get(), 2);
        }

        #[test]
        fn test_click_link_until_gives_up() {
            let driver = Arc::new(MockDriver::new());
            driver.on_find(&Locator::link("More"), vec![ElementHandle::new("m", "a")]);
            let (session, _clock) = session(&driver);
            let err = session
                .click_link_until("More", || Ok(false), Duration::from_millis(50), &none())
                .unwrap_err();
            assert_eq!(err.kind(), FailureKind::ConditionNotMet);
        }
    }

    mod property_tests {
        use super::*;

        #[test]
        fn test_text_reread_after_stale() {
            let driver = Arc::new(MockDriver::new());
            driver.on_find(&Locator::css("h1"), vec![ElementHandle::new("h", "h1")]);
            driver.stub_text("h", "Dashboard").stale_reads("h", 2);
            let (session, _clock) = session(&driver);
            assert_eq!(session.find_css("h1", &none()).text().unwrap(), "Dashboard");
            assert_eq!(driver.find_calls(&Locator::css("h1")), 3);
        }

        #[test]
        fn test_markup_reread_after_stale() {
            let driver = Arc::new(MockDriver::new());
            let locator = Locator::css("td");
            driver.on_find(&locator, vec![ElementHandle::new("c", "td")]);
            driver.stub_inner_html("c", "<b>42</b>");
            let (session, _clock) = session(&driver);
            let cell = session.find_css("td", &none());

            driver.stale_reads("c", 1);
            assert_eq!(cell.inner_html().unwrap(), "<b>42</b>");
            assert_eq!(driver.find_calls(&locator), 2);

            driver.stale_reads("c", 1);
            assert_eq!(cell.outer_html().unwrap(), "<td><b>42</b></td>");
            assert_eq!(driver.find_calls(&locator), 4);
        }

        #[test]
        fn test_title_reread_after_stale() {
            let driver = Arc::new(MockDriver::new());
            let locator = Locator::link("Help");
            driver.on_find(
                &locator,
                vec![ElementHandle::new("h", "a").with_text("Help")],
            );
            driver.stub_title("h", "Help centre").stale_reads("h", 1);
            let (session, _clock) = session(&driver);
            let link = session.find_link("Help", &none());
            assert_eq!(link.title().unwrap(), "Help centre");
            assert_eq!(driver.find_calls(&locator), 2);
        }

        #[test]
        fn test_selected_option_reread_after_stale() {
            let driver = Arc::new(MockDriver::new());
            let locator = Locator::field("Colour");
            driver.on_find(&locator, vec![ElementHandle::new("c", "select")]);
            driver.stub_selected_option("c", "Blue").stale_reads("c", 2);
            let (session, _clock) = session(&driver);
            let colour = session.find_field("Colour", &none());
            assert_eq!(colour.selected_option().unwrap(), "Blue");
            assert_eq!(driver.find_calls(&locator), 3);
        }

        #[test]
        fn test_id_and_name_attributes() {
            let driver = Arc::new(MockDriver::new());
            let user = ElementHandle::new("u", "input").with_attribute("name", "user");
            driver.on_find(&Locator::field("User"), vec![user]);
            let (session, _clock) = session(&driver);
            let field = session.find_field("User", &none());
            assert_eq!(field.name().unwrap(), "user");
            assert_eq!(field.id().unwrap(), "");
            assert_eq!(field.attribute("type").unwrap(), None);
        }

        #[test]
        fn test_is_disabled() {
            let driver = Arc::new(MockDriver::new());
            let pay = ElementHandle::new("p", "button")
                .with_text("Pay")
                .disabled();
            driver.on_find(&Locator::button("Pay"), vec![pay]);
            let (session, _clock) = session(&driver);
            assert!(session.find_button("Pay", &none()).is_disabled().unwrap());
        }

        #[test]
        fn test_is_visible_with_hidden_considered() {
            let driver = Arc::new(MockDriver::new());
            driver.on_find(
                &Locator::css("#tip"),
                vec![ElementHandle::new("tip", "div").hidden()],
            );
            let (session, _clock) = session(&driver);
            let tip = session.find_css("#tip", &none().consider_invisible(true));
            assert!(!tip.is_visible().unwrap());
        }
    }

    mod find_all_tests {
        use super::*;

        #[test]
        fn test_find_all_without_predicate_returns_immediately() {
            let driver = Arc::new(MockDriver::new());
            let (session, clock) = session(&driver);
            let items = session.find_all_css("li", None, &none()).unwrap();
            assert!(items.is_empty());
            assert_eq!(clock.sleep_count(), 0);
        }

        #[test]
        fn test_find_all_waits_for_predicate() {
            let driver = Arc::new(MockDriver::new());
            let locator = Locator::xpath("//li");
            let milk = || ElementHandle::new("1", "li").with_text("Milk");
            let eggs = ElementHandle::new("2", "li").with_text("Eggs");
            driver
                .on_find(&locator, vec![milk()])
                .on_find(&locator, vec![milk(), eggs]);
            let (session, _clock) = session(&driver);
            fn two(items: &[SnapshotElementScope<'_>]) -> bool {
                items.len() == 2
            }
            let items = session.find_all_xpath("//li", Some(&two), &none()).unwrap();
            assert_eq!(items.len(), 2);
            assert_eq!(items[1].text(), "Eggs");
        }

        #[test]
        fn test_find_all_predicate_timeout_is_not_found() {
            let driver = Arc::new(MockDriver::new());
            let (session, _clock) = session(&driver);
            fn never(_: &[SnapshotElementScope<'_>]) -> bool {
                false
            }
            let err = session
                .find_all_css("li", Some(&never), &none())
                .unwrap_err();
            assert_eq!(err.kind(), FailureKind::NotFound);
        }
    }

    mod waiting_tests {
        use super::*;

        #[test]
        fn test_query_fn_on_scope() {
            let driver = Arc::new(MockDriver::new());
            let (session, _clock) = session(&driver);
            let polls = Cell::new(0);
            let result = session
                .query_fn(
                    || {
                        polls.set(polls.get() + 1);
                        Ok(polls.get())
                    },
                    3,
                    &none(),
                )
                .unwrap();
            assert_eq!(result, 3);
        }

        #[test]
        fn test_retry_until_timeout_on_scope_uses_overrides() {
            let driver = Arc::new(MockDriver::new());
            let (session, clock) = session(&driver);
            let result: PatienceResult<()> = session.retry_until_timeout(
                || Err(PatienceError::not_found("thing")),
                &none().timeout(Duration::ZERO),
            );
            assert!(result.is_err());
            assert_eq!(clock.sleep_count(), 0);
        }
    }
}
