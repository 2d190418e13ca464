//! Snapshot element scopes returned by `find_all`.
//!
//! Unlike [`crate::ElementScope`], a snapshot is resolved once and keeps the
//! handle plus the properties read at capture time. Reading those is free;
//! acting on the handle or finding inside it may fail with `Stale` once the
//! document has moved on.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::driver::ElementHandle;
use crate::options::Options;
use crate::result::PatienceResult;
use crate::scope::DriverScope;
use crate::session::Session;

/// One element as it was when `find_all` captured it
#[derive(Clone, Serialize)]
pub struct SnapshotElementScope<'s> {
    #[serde(skip)]
    parent: &'s dyn DriverScope,
    #[serde(skip)]
    options: Options,
    handle: ElementHandle,
    text: String,
    value: String,
    outer_html: String,
    inner_html: String,
    title: String,
    selected_option: String,
    selected: bool,
    disabled: bool,
}

impl fmt::Debug for SnapshotElementScope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotElementScope")
            .field("handle", &self.handle)
            .field("text", &self.text)
            .field("value", &self.value)
            .field("title", &self.title)
            .field("selected_option", &self.selected_option)
            .field("selected", &self.selected)
            .field("disabled", &self.disabled)
            .finish_non_exhaustive()
    }
}

impl<'s> SnapshotElementScope<'s> {
    /// Read the element's properties once
    pub(crate) fn capture(
        parent: &'s dyn DriverScope,
        handle: ElementHandle,
        options: &Options,
    ) -> PatienceResult<Self> {
        let driver = parent.driver();
        let text = driver.text(&handle)?;
        let value = driver.value(&handle)?;
        let outer_html = driver.outer_html(&handle)?;
        let inner_html = driver.inner_html(&handle)?;
        let title = driver.title(&handle)?;
        let selected_option = driver.selected_option(&handle)?;
        let selected = driver.is_selected(&handle)?;
        let disabled = driver.is_disabled(&handle)?;
        Ok(Self {
            parent,
            options: options.clone(),
            handle,
            text,
            value,
            outer_html,
            inner_html,
            title,
            selected_option,
            selected,
            disabled,
        })
    }

    /// The captured handle
    #[must_use]
    pub const fn handle(&self) -> &ElementHandle {
        &self.handle
    }

    /// Text at capture time
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Value at capture time
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Outer markup at capture time
    #[must_use]
    pub fn outer_html(&self) -> &str {
        &self.outer_html
    }

    /// Inner markup at capture time
    #[must_use]
    pub fn inner_html(&self) -> &str {
        &self.inner_html
    }

    /// Title at capture time
    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Selected option text at capture time
    #[must_use]
    pub fn selected_option(&self) -> &str {
        &self.selected_option
    }

    /// Selected state at capture time
    #[must_use]
    pub const fn is_selected(&self) -> bool {
        self.selected
    }

    /// Disabled state at capture time
    #[must_use]
    pub const fn is_disabled(&self) -> bool {
        self.disabled
    }

    /// Attribute as observed by the query that found the element
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.handle.attribute(name)
    }

    /// All attributes observed by the query
    #[must_use]
    pub const fn attributes(&self) -> &BTreeMap<String, String> {
        &self.handle.attributes
    }

    /// `id` attribute, empty when absent
    #[must_use]
    pub fn id(&self) -> &str {
        self.attribute("id").unwrap_or("")
    }

    /// Click the captured handle once, without re-resolving
    pub fn click(&self) -> PatienceResult<()> {
        self.parent.driver().click(&self.handle)
    }

    /// Serialize the captured properties as JSON
    pub fn to_json(&self) -> PatienceResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl DriverScope for SnapshotElementScope<'_> {
    fn session(&self) -> &Session {
        self.parent.session()
    }

    fn scope_options(&self) -> &Options {
        &self.options
    }

    fn resolve_once(&self) -> PatienceResult<Option<ElementHandle>> {
        Ok(Some(self.handle.clone()))
    }

    fn describe(&self) -> String {
        format!("{} > snapshot {}", self.parent.describe(), self.handle.id)
    }
}
