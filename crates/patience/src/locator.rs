//! Locators: immutable descriptions of what to find.
//!
//! A [`Locator`] is a [`Selector`] kind with its pattern plus an optional
//! [`TextFilter`]. The driver interprets the selector; the finder applies the
//! text filter and disambiguation. Locators are never mutated after
//! construction and are re-evaluated on every attempt.

use regex::Regex;
use std::fmt;

use crate::options::TextPrecision;

/// Selector kind for locating elements
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// CSS selector (e.g., "button.primary")
    Css(String),
    /// XPath expression
    XPath(String),
    /// Exact `id` attribute
    Id(String),
    /// `id` attribute ending with the given suffix
    IdEndingWith(String),
    /// Button by text, value, name or id
    Button(String),
    /// Link by text
    Link(String),
    /// Form field by label, name, id or placeholder
    Field(String),
    /// Section (heading-introduced region) by heading text
    Section(String),
    /// Fieldset by legend text
    Fieldset(String),
    /// Frame or iframe by name, id or title
    Frame(String),
    /// Browser window by name or title
    Window(String),
}

impl Selector {
    /// Short name of the selector kind
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Css(_) => "css",
            Self::XPath(_) => "xpath",
            Self::Id(_) => "id",
            Self::IdEndingWith(_) => "id ending with",
            Self::Button(_) => "button",
            Self::Link(_) => "link",
            Self::Field(_) => "field",
            Self::Section(_) => "section",
            Self::Fieldset(_) => "fieldset",
            Self::Frame(_) => "frame",
            Self::Window(_) => "window",
        }
    }

    /// Raw pattern handed to the driver
    #[must_use]
    pub fn pattern(&self) -> &str {
        match self {
            Self::Css(p)
            | Self::XPath(p)
            | Self::Id(p)
            | Self::IdEndingWith(p)
            | Self::Button(p)
            | Self::Link(p)
            | Self::Field(p)
            | Self::Section(p)
            | Self::Fieldset(p)
            | Self::Frame(p)
            | Self::Window(p) => p,
        }
    }
}

/// Text predicate applied to matched elements
#[derive(Debug, Clone)]
pub enum TextFilter {
    /// Plain text, compared according to [`TextPrecision`]
    Text(String),
    /// Regular expression over the element text
    Pattern(Regex),
}

impl TextFilter {
    /// Whether `text` satisfies this filter under `precision`
    #[must_use]
    pub fn matches(&self, text: &str, precision: TextPrecision) -> bool {
        match self {
            Self::Text(expected) => {
                let actual = normalize_whitespace(text);
                let expected = normalize_whitespace(expected);
                match precision {
                    TextPrecision::Exact => actual == expected,
                    TextPrecision::Substring | TextPrecision::PreferExact => {
                        actual.contains(&expected)
                    }
                }
            }
            Self::Pattern(regex) => regex.is_match(text),
        }
    }

    /// Whether `text` is an exact match, used to break ties
    #[must_use]
    pub fn matches_exactly(&self, text: &str) -> bool {
        match self {
            Self::Text(expected) => normalize_whitespace(text) == normalize_whitespace(expected),
            Self::Pattern(regex) => regex.is_match(text),
        }
    }
}

impl PartialEq for TextFilter {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Pattern(a), Self::Pattern(b)) => a.as_str() == b.as_str(),
            _ => false,
        }
    }
}

impl fmt::Display for TextFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "'{text}'"),
            Self::Pattern(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

/// Collapse runs of whitespace and trim, as rendered text does
#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// An immutable description of which element(s) satisfy a lookup
#[derive(Debug, Clone, PartialEq)]
pub struct Locator {
    selector: Selector,
    text: Option<TextFilter>,
}

impl Locator {
    /// Create a locator from a selector
    #[must_use]
    pub const fn from_selector(selector: Selector) -> Self {
        Self {
            selector,
            text: None,
        }
    }

    /// CSS locator
    #[must_use]
    pub fn css(selector: impl Into<String>) -> Self {
        Self::from_selector(Selector::Css(selector.into()))
    }

    /// XPath locator
    #[must_use]
    pub fn xpath(xpath: impl Into<String>) -> Self {
        Self::from_selector(Selector::XPath(xpath.into()))
    }

    /// Exact id locator
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self::from_selector(Selector::Id(id.into()))
    }

    /// Id suffix locator
    #[must_use]
    pub fn id_ending_with(suffix: impl Into<String>) -> Self {
        Self::from_selector(Selector::IdEndingWith(suffix.into()))
    }

    /// Button locator
    #[must_use]
    pub fn button(locator: impl Into<String>) -> Self {
        Self::from_selector(Selector::Button(locator.into()))
    }

    /// Link locator
    #[must_use]
    pub fn link(locator: impl Into<String>) -> Self {
        Self::from_selector(Selector::Link(locator.into()))
    }

    /// Field locator
    #[must_use]
    pub fn field(locator: impl Into<String>) -> Self {
        Self::from_selector(Selector::Field(locator.into()))
    }

    /// Section locator
    #[must_use]
    pub fn section(locator: impl Into<String>) -> Self {
        Self::from_selector(Selector::Section(locator.into()))
    }

    /// Fieldset locator
    #[must_use]
    pub fn fieldset(locator: impl Into<String>) -> Self {
        Self::from_selector(Selector::Fieldset(locator.into()))
    }

    /// Frame locator
    #[must_use]
    pub fn frame(locator: impl Into<String>) -> Self {
        Self::from_selector(Selector::Frame(locator.into()))
    }

    /// Window locator
    #[must_use]
    pub fn window(locator: impl Into<String>) -> Self {
        Self::from_selector(Selector::Window(locator.into()))
    }

    /// Filter by text content
    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        Self {
            text: Some(TextFilter::Text(text.into())),
            ..self
        }
    }

    /// Filter by a text pattern
    #[must_use]
    pub fn with_text_matching(self, pattern: Regex) -> Self {
        Self {
            text: Some(TextFilter::Pattern(pattern)),
            ..self
        }
    }

    /// Get the selector
    #[must_use]
    pub const fn selector(&self) -> &Selector {
        &self.selector
    }

    /// Get the text filter
    #[must_use]
    pub const fn text_filter(&self) -> Option<&TextFilter> {
        self.text.as_ref()
    }

    /// Whether this locator is resolved against windows rather than elements
    #[must_use]
    pub const fn is_window(&self) -> bool {
        matches!(self.selector, Selector::Window(_))
    }

    /// Human-readable description used in failures
    #[must_use]
    pub fn description(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.selector.kind(), self.selector.pattern())?;
        if let Some(text) = &self.text {
            write!(f, " with text {text}")?;
        }
        Ok(())
    }
}
