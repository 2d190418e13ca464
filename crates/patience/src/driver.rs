//! Driver boundary: the only external collaborator of the engine.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  Session / ElementScope                                      │
//! │        │ resolve (retried)            act (retried)          │
//! │        ▼                                  ▼                  │
//! │  ElementFinder ──► Driver::find_all   Driver::click, ...     │
//! │                    Driver::find_windows                      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Driver (trait)  one synchronous round trip per call         │
//! │   ├─ your browser transport                                  │
//! │   └─ MockDriver (scripted, for tests)                        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Implementations must never block or retry; retrying is the engine's job.
//! Accessors on a handle report a detached node as [`PatienceError::Stale`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::locator::Locator;
use crate::options::Options;
use crate::result::{PatienceError, PatienceResult};

/// Handle to a live document node (or window) as returned by a driver.
///
/// The descriptive fields are what the driver observed during the query
/// that produced the handle. The handle is valid only until the document
/// mutates; never hold one across attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    /// Driver-assigned node identity
    pub id: String,
    /// Element tag name
    pub tag_name: String,
    /// Text content at query time
    pub text_content: Option<String>,
    /// Whether the element was rendered visibly at query time
    pub visible: bool,
    /// Whether the element was disabled at query time
    pub disabled: bool,
    /// Attributes observed at query time
    pub attributes: BTreeMap<String, String>,
}

impl ElementHandle {
    /// Create a visible, enabled handle
    #[must_use]
    pub fn new(id: impl Into<String>, tag_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tag_name: tag_name.into(),
            text_content: None,
            visible: true,
            disabled: false,
            attributes: BTreeMap::new(),
        }
    }

    /// Set text content
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_content = Some(text.into());
        self
    }

    /// Add an attribute
    #[must_use]
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Mark as hidden
    #[must_use]
    pub const fn hidden(mut self) -> Self {
        self.visible = false;
        self
    }

    /// Mark as disabled
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Text observed at query time, empty when none
    #[must_use]
    pub fn text(&self) -> &str {
        self.text_content.as_deref().unwrap_or("")
    }

    /// Attribute observed at query time
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Abstract driver trait for the live document.
///
/// `scope` is the resolved handle of the enclosing element scope, or `None`
/// for the current document (inside whatever frame/window is entered).
pub trait Driver: Send + Sync {
    /// All current matches for `locator`, empty when none
    fn find_all(
        &self,
        locator: &Locator,
        scope: Option<&ElementHandle>,
        options: &Options,
    ) -> PatienceResult<Vec<ElementHandle>>;

    /// All current windows matching `locator`
    fn find_windows(
        &self,
        locator: &Locator,
        scope: Option<&ElementHandle>,
        options: &Options,
    ) -> PatienceResult<Vec<ElementHandle>>;

    /// Rendered text of the scope (or whole document)
    fn page_text(&self, scope: Option<&ElementHandle>) -> PatienceResult<String>;

    /// Live text of an element
    fn text(&self, element: &ElementHandle) -> PatienceResult<String>;

    /// Live value of a form element
    fn value(&self, element: &ElementHandle) -> PatienceResult<String>;

    /// Live attribute of an element
    fn attribute(&self, element: &ElementHandle, name: &str) -> PatienceResult<Option<String>>;

    /// Markup of the element including its own tag
    fn outer_html(&self, element: &ElementHandle) -> PatienceResult<String>;

    /// Markup of the element's children
    fn inner_html(&self, element: &ElementHandle) -> PatienceResult<String>;

    /// Title of the element; for a window handle, the window title
    fn title(&self, element: &ElementHandle) -> PatienceResult<String>;

    /// Text of the selected option of a select element
    fn selected_option(&self, element: &ElementHandle) -> PatienceResult<String>;

    /// Whether an option, checkbox or radio is selected
    fn is_selected(&self, element: &ElementHandle) -> PatienceResult<bool>;

    /// Whether an element is disabled
    fn is_disabled(&self, element: &ElementHandle) -> PatienceResult<bool>;

    /// Click an element
    fn click(&self, element: &ElementHandle) -> PatienceResult<()>;

    /// Replace the value of a form field
    fn set_value(&self, element: &ElementHandle, value: &str) -> PatienceResult<()>;

    /// Choose an option of a select element by text or value
    fn select_option(&self, element: &ElementHandle, option: &str) -> PatienceResult<()>;

    /// Check or uncheck a checkbox or radio
    fn set_checked(&self, element: &ElementHandle, checked: bool) -> PatienceResult<()>;

    /// Move the pointer over an element
    fn hover(&self, element: &ElementHandle) -> PatienceResult<()>;

    /// Send keystrokes to an element
    fn send_keys(&self, element: &ElementHandle, keys: &str) -> PatienceResult<()>;

    /// Switch the document context into a frame
    fn enter_frame(&self, frame: &ElementHandle) -> PatienceResult<()>;

    /// Switch back out of the innermost frame
    fn leave_frame(&self) -> PatienceResult<()>;

    /// Switch the document context to a window
    fn enter_window(&self, window: &ElementHandle) -> PatienceResult<()>;

    /// Switch back to the previous window
    fn leave_window(&self) -> PatienceResult<()>;
}

// =============================================================================
// MOCK DRIVER
// =============================================================================

/// Scripted failure returned by [`MockDriver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockFault {
    /// Handle detached from the document
    Stale,
    /// Unclassified driver failure
    Driver(String),
}

impl MockFault {
    fn into_error(self, what: &str) -> PatienceError {
        match self {
            Self::Stale => PatienceError::stale(what),
            Self::Driver(message) => PatienceError::driver(message),
        }
    }
}

/// Sequence of scripted responses; the last one repeats forever
#[derive(Debug)]
struct Script<T> {
    steps: VecDeque<Result<T, MockFault>>,
    last: Option<Result<T, MockFault>>,
}

impl<T> Default for Script<T> {
    fn default() -> Self {
        Self {
            steps: VecDeque::new(),
            last: None,
        }
    }
}

impl<T: Clone> Script<T> {
    fn push(&mut self, step: Result<T, MockFault>) {
        self.steps.push_back(step);
    }

    fn next(&mut self) -> Option<Result<T, MockFault>> {
        if let Some(step) = self.steps.pop_front() {
            self.last = Some(step.clone());
            return Some(step);
        }
        self.last.clone()
    }
}

/// Live state of an element behind the mock
#[derive(Debug, Clone, Default)]
struct MockElement {
    text: Option<String>,
    value: String,
    selected: bool,
    inner_html: Option<String>,
    title: Option<String>,
    selected_option: Option<String>,
    stale_reads: usize,
}

#[derive(Debug, Default)]
struct MockState {
    finds: HashMap<String, Script<Vec<ElementHandle>>>,
    find_calls: HashMap<String, usize>,
    page_text: Script<String>,
    page_text_calls: usize,
    elements: HashMap<String, MockElement>,
    action_faults: HashMap<String, VecDeque<MockFault>>,
    call_history: Vec<String>,
    contexts: Vec<String>,
}

/// Mock driver for unit testing.
///
/// Responses are scripted per locator and consumed one per round trip; the
/// final scripted response repeats. Unscripted locators match nothing.
#[derive(Debug, Default)]
pub struct MockDriver {
    state: Mutex<MockState>,
}

impl MockDriver {
    /// Create new mock driver
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Script the next response for `locator`
    pub fn on_find(&self, locator: &Locator, matches: Vec<ElementHandle>) -> &Self {
        self.state()
            .finds
            .entry(locator.description())
            .or_default()
            .push(Ok(matches));
        self
    }

    /// Script the next response for `locator` as a fault
    pub fn on_find_fault(&self, locator: &Locator, fault: MockFault) -> &Self {
        self.state()
            .finds
            .entry(locator.description())
            .or_default()
            .push(Err(fault));
        self
    }

    /// Script the next rendered page text
    pub fn on_page_text(&self, text: impl Into<String>) -> &Self {
        self.state().page_text.push(Ok(text.into()));
        self
    }

    /// Set the live text of an element
    pub fn stub_text(&self, id: &str, text: impl Into<String>) -> &Self {
        self.update_element(id, |e| e.text = Some(text.into()))
    }

    /// Set the live value of an element
    pub fn stub_value(&self, id: &str, value: impl Into<String>) -> &Self {
        self.update_element(id, |e| e.value = value.into())
    }

    /// Set the live selected state of an element
    pub fn stub_selected(&self, id: &str, selected: bool) -> &Self {
        self.update_element(id, |e| e.selected = selected)
    }

    /// Set the live inner markup of an element
    pub fn stub_inner_html(&self, id: &str, html: impl Into<String>) -> &Self {
        self.update_element(id, |e| e.inner_html = Some(html.into()))
    }

    /// Set the live title of an element or window
    pub fn stub_title(&self, id: &str, title: impl Into<String>) -> &Self {
        self.update_element(id, |e| e.title = Some(title.into()))
    }

    /// Set the live selected option text of a select element
    pub fn stub_selected_option(&self, id: &str, option: impl Into<String>) -> &Self {
        self.update_element(id, |e| e.selected_option = Some(option.into()))
    }

    /// Make the next `reads` accessor calls on an element fail as stale
    pub fn stale_reads(&self, id: &str, reads: usize) -> &Self {
        self.update_element(id, |e| e.stale_reads = reads)
    }

    fn update_element(&self, id: &str, update: impl FnOnce(&mut MockElement)) -> &Self {
        update(self.state().elements.entry(id.to_string()).or_default());
        self
    }

    /// Make the next actions on an element fail with the given faults
    pub fn fail_actions(&self, id: &str, faults: Vec<MockFault>) -> &Self {
        self.state()
            .action_faults
            .entry(id.to_string())
            .or_default()
            .extend(faults);
        self
    }

    /// Number of round trips made for `locator`
    #[must_use]
    pub fn find_calls(&self, locator: &Locator) -> usize {
        self.state()
            .find_calls
            .get(&locator.description())
            .copied()
            .unwrap_or(0)
    }

    /// Number of page text reads
    #[must_use]
    pub fn page_text_calls(&self) -> usize {
        self.state().page_text_calls
    }

    /// Get call history
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.state().call_history.clone()
    }

    /// Check if method was called
    #[must_use]
    pub fn was_called(&self, method: &str) -> bool {
        self.state()
            .call_history
            .iter()
            .any(|c| c.starts_with(method))
    }

    /// Currently entered frame/window contexts, outermost first
    #[must_use]
    pub fn contexts(&self) -> Vec<String> {
        self.state().contexts.clone()
    }

    fn lookup(&self, locator: &Locator) -> PatienceResult<Vec<ElementHandle>> {
        let key = locator.description();
        let mut state = self.state();
        *state.find_calls.entry(key.clone()).or_insert(0) += 1;
        match state.finds.get_mut(&key).and_then(Script::next) {
            Some(Ok(matches)) => Ok(matches),
            Some(Err(fault)) => Err(fault.into_error(&key)),
            None => Ok(Vec::new()),
        }
    }

    fn read<T>(
        &self,
        element: &ElementHandle,
        read: impl FnOnce(&MockElement) -> T,
    ) -> PatienceResult<T> {
        let mut state = self.state();
        let live = state.elements.entry(element.id.clone()).or_default();
        if live.stale_reads > 0 {
            live.stale_reads -= 1;
            return Err(PatienceError::stale(format!("element {}", element.id)));
        }
        Ok(read(live))
    }

    fn act(
        &self,
        element: &ElementHandle,
        record: String,
        apply: impl FnOnce(&mut MockElement),
    ) -> PatienceResult<()> {
        let mut state = self.state();
        if let Some(fault) = state
            .action_faults
            .get_mut(&element.id)
            .and_then(VecDeque::pop_front)
        {
            return Err(fault.into_error(&format!("element {}", element.id)));
        }
        apply(state.elements.entry(element.id.clone()).or_default());
        state.call_history.push(record);
        Ok(())
    }

    fn leave(&self, kind: &str) -> PatienceResult<()> {
        let mut state = self.state();
        if !state.contexts.last().is_some_and(|top| top.starts_with(kind)) {
            return Err(PatienceError::driver(format!(
                "cannot leave {kind}, current context is {:?}",
                state.contexts.last()
            )));
        }
        state.contexts.pop();
        state.call_history.push(format!("leave_{kind}"));
        Ok(())
    }
}

impl Driver for MockDriver {
    fn find_all(
        &self,
        locator: &Locator,
        _scope: Option<&ElementHandle>,
        _options: &Options,
    ) -> PatienceResult<Vec<ElementHandle>> {
        self.lookup(locator)
    }

    fn find_windows(
        &self,
        locator: &Locator,
        _scope: Option<&ElementHandle>,
        _options: &Options,
    ) -> PatienceResult<Vec<ElementHandle>> {
        self.lookup(locator)
    }

    fn page_text(&self, _scope: Option<&ElementHandle>) -> PatienceResult<String> {
        let mut state = self.state();
        state.page_text_calls += 1;
        match state.page_text.next() {
            Some(Ok(text)) => Ok(text),
            Some(Err(fault)) => Err(fault.into_error("page")),
            None => Ok(String::new()),
        }
    }

    fn text(&self, element: &ElementHandle) -> PatienceResult<String> {
        self.read(element, |live| {
            live.text
                .clone()
                .unwrap_or_else(|| element.text().to_string())
        })
    }

    fn value(&self, element: &ElementHandle) -> PatienceResult<String> {
        self.read(element, |live| live.value.clone())
    }

    fn attribute(&self, element: &ElementHandle, name: &str) -> PatienceResult<Option<String>> {
        self.read(element, |_| element.attribute(name).map(str::to_string))
    }

    fn outer_html(&self, element: &ElementHandle) -> PatienceResult<String> {
        self.read(element, |live| {
            let inner = live
                .inner_html
                .clone()
                .unwrap_or_else(|| element.text().to_string());
            format!("<{tag}>{inner}</{tag}>", tag = element.tag_name)
        })
    }

    fn inner_html(&self, element: &ElementHandle) -> PatienceResult<String> {
        self.read(element, |live| {
            live.inner_html
                .clone()
                .unwrap_or_else(|| element.text().to_string())
        })
    }

    fn title(&self, element: &ElementHandle) -> PatienceResult<String> {
        self.read(element, |live| {
            live.title
                .clone()
                .or_else(|| element.attribute("title").map(str::to_string))
                .unwrap_or_default()
        })
    }

    fn selected_option(&self, element: &ElementHandle) -> PatienceResult<String> {
        self.read(element, |live| {
            live.selected_option
                .clone()
                .unwrap_or_else(|| live.value.clone())
        })
    }

    fn is_selected(&self, element: &ElementHandle) -> PatienceResult<bool> {
        self.read(element, |live| live.selected)
    }

    fn is_disabled(&self, element: &ElementHandle) -> PatienceResult<bool> {
        self.read(element, |_| element.disabled)
    }

    fn click(&self, element: &ElementHandle) -> PatienceResult<()> {
        self.act(element, format!("click:{}", element.id), |_| {})
    }

    fn set_value(&self, element: &ElementHandle, value: &str) -> PatienceResult<()> {
        self.act(element, format!("fill:{}={value}", element.id), |live| {
            live.value = value.to_string();
        })
    }

    fn select_option(&self, element: &ElementHandle, option: &str) -> PatienceResult<()> {
        self.act(element, format!("select:{}={option}", element.id), |live| {
            live.value = option.to_string();
        })
    }

    fn set_checked(&self, element: &ElementHandle, checked: bool) -> PatienceResult<()> {
        let verb = if checked { "check" } else { "uncheck" };
        self.act(element, format!("{verb}:{}", element.id), |live| {
            live.selected = checked;
        })
    }

    fn hover(&self, element: &ElementHandle) -> PatienceResult<()> {
        self.act(element, format!("hover:{}", element.id), |_| {})
    }

    fn send_keys(&self, element: &ElementHandle, keys: &str) -> PatienceResult<()> {
        self.act(element, format!("keys:{}={keys}", element.id), |_| {})
    }

    fn enter_frame(&self, frame: &ElementHandle) -> PatienceResult<()> {
        let mut state = self.state();
        state.contexts.push(format!("frame:{}", frame.id));
        state.call_history.push(format!("enter_frame:{}", frame.id));
        Ok(())
    }

    fn leave_frame(&self) -> PatienceResult<()> {
        self.leave("frame")
    }

    fn enter_window(&self, window: &ElementHandle) -> PatienceResult<()> {
        let mut state = self.state();
        state.contexts.push(format!("window:{}", window.id));
        let entry = format!("enter_window:{}", window.id);
        state.call_history.push(entry);
        Ok(())
    }

    fn leave_window(&self) -> PatienceResult<()> {
        self.leave("window")
    }
}
