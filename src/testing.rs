//! In-memory browser backend for exercising sessions without a browser process.
//!
//! Pages are plain HTML fixtures parsed with `scraper`. Form state (values,
//! checkboxes, selected options) lives beside the parsed document, so the
//! mock behaves like a live page for the operations a session performs.

use crate::core::{BrowserDriver, Config, FrameRef, RetryConfig, ScheduleConfig, WaitConfig};
use crate::dom::SelectorKind;
use crate::errors::{BrowserError, Result};
use scraper::{ElementRef, Html, Selector as CssSelector};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const BLANK_PAGE: &str = "<html><head><title></title></head><body></body></html>";

/// Install a `tracing` subscriber for tests. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Configuration with near-instant retry budgets: two tries, no wall-clock
/// allowance, and a 5ms wait poll. Keeps failure paths fast in tests.
pub fn quick_config() -> Config {
    let schedule = ScheduleConfig {
        timeout_ms: 0,
        min_tries: 2,
        delay_ms: 1,
        ..ScheduleConfig::default()
    };
    Config {
        retry: RetryConfig {
            element: schedule.clone(),
            click: schedule.clone(),
            window: schedule.clone(),
            frame: schedule.clone(),
            assertion: schedule,
        },
        wait: WaitConfig {
            poll_interval_ms: 5,
        },
        ..Config::default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertEvent {
    Accepted,
    Dismissed,
    Authenticated { username: String, password: String },
}

#[derive(Debug, Clone)]
struct MockNode {
    tag: String,
    attrs: HashMap<String, String>,
    text: String,
    options: Vec<usize>,
    owner: Option<usize>,
}

/// One parsed document plus the form state a user would have changed.
pub struct MockPage {
    source: String,
    html: Html,
    nodes: Vec<MockNode>,
    values: HashMap<usize, String>,
    checked: HashMap<usize, bool>,
    selected: HashMap<usize, usize>,
    clicks: HashMap<usize, usize>,
}

fn elements(html: &Html) -> Vec<ElementRef<'_>> {
    html.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_css(query: &str) -> Result<CssSelector> {
    CssSelector::parse(query)
        .map_err(|e| BrowserError::Driver(format!("invalid selector '{}': {}", query, e)))
}

impl MockPage {
    pub fn parse(source: &str) -> Self {
        let html = Html::parse_document(source);
        let all = elements(&html);

        let mut nodes: Vec<MockNode> = all
            .iter()
            .map(|element| MockNode {
                tag: element.value().name().to_lowercase(),
                attrs: element
                    .value()
                    .attrs()
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect(),
                text: collapse_whitespace(&element.text().collect::<String>()),
                options: Vec::new(),
                owner: None,
            })
            .collect();

        for (index, element) in all.iter().enumerate() {
            if nodes[index].tag != "select" {
                continue;
            }
            let options: Vec<usize> = element
                .descendants()
                .filter_map(ElementRef::wrap)
                .filter(|child| child.value().name() == "option")
                .filter_map(|child| all.iter().position(|candidate| *candidate == child))
                .collect();
            for option in &options {
                nodes[*option].owner = Some(index);
            }
            nodes[index].options = options;
        }

        Self {
            source: source.to_string(),
            html,
            nodes,
            values: HashMap::new(),
            checked: HashMap::new(),
            selected: HashMap::new(),
            clicks: HashMap::new(),
        }
    }

    pub fn title(&self) -> String {
        self.nodes
            .iter()
            .find(|node| node.tag == "title")
            .map(|node| node.text.clone())
            .unwrap_or_default()
    }

    fn find(&self, kind: SelectorKind, query: &str) -> Result<Vec<usize>> {
        match kind {
            SelectorKind::Css => {
                let selector = parse_css(query)?;
                let all = elements(&self.html);
                Ok(self
                    .html
                    .select(&selector)
                    .filter_map(|found| all.iter().position(|candidate| *candidate == found))
                    .collect())
            }
            SelectorKind::Id => Ok(self.matching(|node| attr_is(node, "id", query))),
            SelectorKind::Name => Ok(self.matching(|node| attr_is(node, "name", query))),
            SelectorKind::Class => Ok(self.matching(|node| {
                node.attrs
                    .get("class")
                    .map_or(false, |classes| classes.split_whitespace().any(|c| c == query))
            })),
            SelectorKind::Link => Ok(self.matching(|node| node.tag == "a" && node.text == query)),
            SelectorKind::XPath => Err(BrowserError::UnsupportedSelectorKind(format!(
                "xpath in the mock driver ({})",
                query
            ))),
        }
    }

    fn matching(&self, predicate: impl Fn(&MockNode) -> bool) -> Vec<usize> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| predicate(node))
            .map(|(index, _)| index)
            .collect()
    }

    fn node(&self, index: usize) -> Result<&MockNode> {
        self.nodes
            .get(index)
            .ok_or_else(|| BrowserError::Driver("stale element reference".to_string()))
    }

    fn input_type(&self, index: usize) -> Option<&str> {
        let node = self.nodes.get(index)?;
        if node.tag != "input" {
            return None;
        }
        Some(node.attrs.get("type").map(String::as_str).unwrap_or("text"))
    }

    fn selected_option(&self, select: usize) -> Option<usize> {
        let options = &self.nodes.get(select)?.options;
        self.selected.get(&select).copied().or_else(|| {
            options
                .iter()
                .copied()
                .find(|option| self.nodes[*option].attrs.contains_key("selected"))
                .or_else(|| options.first().copied())
        })
    }

    fn value_of(&self, index: usize) -> Result<String> {
        if let Some(value) = self.values.get(&index) {
            return Ok(value.clone());
        }
        let node = self.node(index)?;
        Ok(match node.tag.as_str() {
            "textarea" => node.text.clone(),
            "option" => node
                .attrs
                .get("value")
                .cloned()
                .unwrap_or_else(|| node.text.clone()),
            "select" => match self.selected_option(index) {
                Some(option) => self.value_of(option)?,
                None => String::new(),
            },
            _ => node.attrs.get("value").cloned().unwrap_or_default(),
        })
    }

    fn is_checked(&self, index: usize) -> Result<bool> {
        let node = self.node(index)?;
        if let Some(state) = self.checked.get(&index) {
            return Ok(*state);
        }
        Ok(match node.tag.as_str() {
            "input" => node.attrs.contains_key("checked"),
            "option" => node
                .owner
                .map_or(false, |select| self.selected_option(select) == Some(index)),
            _ => false,
        })
    }

    fn click(&mut self, index: usize) -> Result<()> {
        let node = self.node(index)?.clone();
        *self.clicks.entry(index).or_insert(0) += 1;

        let input_type = self.input_type(index).map(str::to_string);
        match (node.tag.as_str(), input_type.as_deref()) {
            ("input", Some("checkbox")) => {
                let now = !self.is_checked(index)?;
                self.checked.insert(index, now);
            }
            ("input", Some("radio")) => {
                let group = node.attrs.get("name").cloned();
                let peers: Vec<usize> = (0..self.nodes.len())
                    .filter(|peer| {
                        self.input_type(*peer) == Some("radio")
                            && self.nodes[*peer].attrs.get("name") == group.as_ref()
                    })
                    .collect();
                for peer in peers {
                    self.checked.insert(peer, false);
                }
                self.checked.insert(index, true);
            }
            ("option", _) => {
                if let Some(select) = node.owner {
                    self.selected.insert(select, index);
                }
            }
            _ => {}
        }
        Ok(())
    }

    pub fn clicks_on(&self, css: &str) -> Result<usize> {
        Ok(self
            .find(SelectorKind::Css, css)?
            .iter()
            .map(|index| self.clicks.get(index).copied().unwrap_or(0))
            .sum())
    }
}

fn attr_is(node: &MockNode, name: &str, expected: &str) -> bool {
    node.attrs.get(name).map(String::as_str) == Some(expected)
}

struct MockWindow {
    handle: String,
    url: String,
    page: MockPage,
    frames: HashMap<usize, MockPage>,
    frame: Option<usize>,
}

impl MockWindow {
    fn load(&mut self, url: &str, source: &str) {
        self.url = url.to_string();
        self.page = MockPage::parse(source);
        self.frames.clear();
        self.frame = None;
    }

    fn document(&mut self) -> &mut MockPage {
        match self.frame {
            Some(frame) => self.frames.get_mut(&frame).unwrap_or(&mut self.page),
            None => &mut self.page,
        }
    }
}

/// Scriptable stand-in for a real browser.
///
/// Besides static pages it can simulate a page that is still settling:
/// elements hidden for the first few lookups, a document swapped in after a
/// number of driver calls, and driver faults on the next calls.
pub struct MockDriver {
    windows: Vec<MockWindow>,
    current: Option<usize>,
    routes: HashMap<String, String>,
    pending_loads: Vec<(usize, String)>,
    hidden: Vec<(String, usize)>,
    faults: usize,
    alert: bool,
    alert_log: Vec<AlertEvent>,
    quits: Arc<AtomicUsize>,
    calls: usize,
    lookups: Vec<(SelectorKind, String)>,
}

impl MockDriver {
    pub fn new(html: &str) -> Self {
        let mut driver = Self {
            windows: Vec::new(),
            current: Some(0),
            routes: HashMap::new(),
            pending_loads: Vec::new(),
            hidden: Vec::new(),
            faults: 0,
            alert: false,
            alert_log: Vec::new(),
            quits: Arc::new(AtomicUsize::new(0)),
            calls: 0,
            lookups: Vec::new(),
        };
        driver.push_window("about:blank", html);
        driver
    }

    pub fn blank() -> Self {
        Self::new(BLANK_PAGE)
    }

    /// Open an additional window. The current window does not change.
    pub fn with_window(mut self, url: &str, html: &str) -> Self {
        self.push_window(url, html);
        self
    }

    /// Content served for `url` by `navigate` and by `<iframe src>`.
    pub fn with_route(mut self, url: &str, html: &str) -> Self {
        self.routes.insert(url.to_string(), html.to_string());
        self
    }

    pub fn with_alert(mut self) -> Self {
        self.alert = true;
        self
    }

    /// Hide elements matching `css` from the next `lookups` element queries.
    pub fn hide_for(mut self, css: &str, lookups: usize) -> Self {
        self.hidden.push((css.to_string(), lookups));
        self
    }

    /// Replace the current document with `html` once `calls` more driver calls were made.
    pub fn load_after(mut self, calls: usize, html: &str) -> Self {
        self.pending_loads.push((calls, html.to_string()));
        self
    }

    /// Fail the next `calls` driver calls with a driver error.
    pub fn fail_next(mut self, calls: usize) -> Self {
        self.faults = calls;
        self
    }

    pub fn fail_next_calls(&mut self, calls: usize) {
        self.faults = calls;
    }

    pub fn open_alert(&mut self) {
        self.alert = true;
    }

    pub fn alert_log(&self) -> &[AlertEvent] {
        &self.alert_log
    }

    /// Shared counter of `quit` calls, still readable after the driver is dropped.
    pub fn quit_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.quits)
    }

    pub fn calls(&self) -> usize {
        self.calls
    }

    /// Every `(kind, query)` pair passed to `find_all`, oldest first.
    pub fn lookups(&self) -> &[(SelectorKind, String)] {
        &self.lookups
    }

    /// Clicks received by elements matching `css` in the current document.
    pub fn clicks_on(&mut self, css: &str) -> Result<usize> {
        self.document()?.clicks_on(css)
    }

    pub fn frame(&self) -> Option<usize> {
        self.current
            .and_then(|current| self.windows.get(current))
            .and_then(|window| window.frame)
    }

    fn push_window(&mut self, url: &str, html: &str) {
        let handle = format!("window-{}", self.windows.len());
        self.windows.push(MockWindow {
            handle,
            url: url.to_string(),
            page: MockPage::parse(html),
            frames: HashMap::new(),
            frame: None,
        });
    }

    fn tick(&mut self) -> Result<()> {
        self.calls += 1;

        let mut due = Vec::new();
        self.pending_loads.retain_mut(|(remaining, html)| {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                due.push(html.clone());
                false
            } else {
                true
            }
        });
        for html in due {
            if let Ok(window) = self.window() {
                let url = window.url.clone();
                window.load(&url, &html);
            }
        }

        if self.faults > 0 {
            self.faults -= 1;
            return Err(BrowserError::Driver("injected driver fault".to_string()));
        }
        Ok(())
    }

    fn window(&mut self) -> Result<&mut MockWindow> {
        let current = self
            .current
            .ok_or_else(|| BrowserError::NoSuchWindow("no current window".to_string()))?;
        self.windows
            .get_mut(current)
            .ok_or_else(|| BrowserError::NoSuchWindow("no current window".to_string()))
    }

    fn document(&mut self) -> Result<&mut MockPage> {
        Ok(self.window()?.document())
    }
}

impl BrowserDriver for MockDriver {
    type Element = usize;

    fn navigate(&mut self, url: &str) -> Result<()> {
        self.tick()?;
        let source = self
            .routes
            .get(url)
            .cloned()
            .unwrap_or_else(|| BLANK_PAGE.to_string());
        self.window()?.load(url, &source);
        Ok(())
    }

    fn find_all(&mut self, kind: SelectorKind, query: &str) -> Result<Vec<usize>> {
        self.lookups.push((kind, query.to_string()));
        self.tick()?;

        let mut masks = Vec::new();
        for (css, remaining) in self.hidden.iter_mut() {
            if *remaining > 0 {
                *remaining -= 1;
                masks.push(css.clone());
            }
        }

        let page = self.document()?;
        let mut found = page.find(kind, query)?;
        for css in masks {
            let masked = page.find(SelectorKind::Css, &css)?;
            found.retain(|index| !masked.contains(index));
        }
        Ok(found)
    }

    fn tag_name(&mut self, element: &usize) -> Result<String> {
        self.tick()?;
        Ok(self.document()?.node(*element)?.tag.clone())
    }

    fn click(&mut self, element: &usize) -> Result<()> {
        self.tick()?;
        self.document()?.click(*element)
    }

    fn clear(&mut self, element: &usize) -> Result<()> {
        self.tick()?;
        let page = self.document()?;
        page.node(*element)?;
        page.values.insert(*element, String::new());
        Ok(())
    }

    fn send_text(&mut self, element: &usize, text: &str) -> Result<()> {
        self.tick()?;
        let page = self.document()?;
        let mut value = page.value_of(*element)?;
        value.push_str(text);
        page.values.insert(*element, value);
        Ok(())
    }

    fn attribute(&mut self, element: &usize, name: &str) -> Result<Option<String>> {
        self.tick()?;
        let page = self.document()?;
        let node = page.node(*element)?;
        if name == "value" && matches!(node.tag.as_str(), "input" | "textarea" | "option" | "select")
        {
            return page.value_of(*element).map(Some);
        }
        Ok(node.attrs.get(name).cloned())
    }

    fn text(&mut self, element: &usize) -> Result<String> {
        self.tick()?;
        Ok(self.document()?.node(*element)?.text.clone())
    }

    fn is_selected(&mut self, element: &usize) -> Result<bool> {
        self.tick()?;
        self.document()?.is_checked(*element)
    }

    fn options(&mut self, select: &usize) -> Result<Vec<usize>> {
        self.tick()?;
        let node = self.document()?.node(*select)?;
        if node.tag != "select" {
            return Err(BrowserError::Driver(format!(
                "element is a <{}>, not a <select>",
                node.tag
            )));
        }
        Ok(node.options.clone())
    }

    fn window_handles(&mut self) -> Result<Vec<String>> {
        self.tick()?;
        Ok(self.windows.iter().map(|w| w.handle.clone()).collect())
    }

    fn current_window(&mut self) -> Result<String> {
        self.tick()?;
        Ok(self.window()?.handle.clone())
    }

    fn switch_to_window(&mut self, handle: &str) -> Result<()> {
        self.tick()?;
        let index = self
            .windows
            .iter()
            .position(|w| w.handle == handle)
            .ok_or_else(|| BrowserError::NoSuchWindow(format!("no window with handle {}", handle)))?;
        self.current = Some(index);
        self.windows[index].frame = None;
        Ok(())
    }

    fn title(&mut self) -> Result<String> {
        self.tick()?;
        Ok(self.window()?.page.title())
    }

    fn current_url(&mut self) -> Result<String> {
        self.tick()?;
        Ok(self.window()?.url.clone())
    }

    fn close_window(&mut self) -> Result<()> {
        self.tick()?;
        let current = self
            .current
            .take()
            .ok_or_else(|| BrowserError::NoSuchWindow("no current window".to_string()))?;
        self.windows.remove(current);
        Ok(())
    }

    fn switch_to_frame(&mut self, frame: &FrameRef) -> Result<()> {
        self.tick()?;
        let window = self.window()?;
        let iframes: Vec<usize> = window
            .page
            .matching(|node| matches!(node.tag.as_str(), "iframe" | "frame"));

        let position = match frame {
            FrameRef::Index(index) => (*index < iframes.len()).then_some(*index),
            FrameRef::Name(name) => iframes.iter().position(|node| {
                let node = &window.page.nodes[*node];
                attr_is(node, "id", name) || attr_is(node, "name", name)
            }),
        }
        .ok_or_else(|| BrowserError::NoSuchFrame(format!("no frame matching {}", frame)))?;

        let src = window.page.nodes[iframes[position]]
            .attrs
            .get("src")
            .cloned()
            .unwrap_or_default();
        let source = self
            .routes
            .get(&src)
            .cloned()
            .unwrap_or_else(|| BLANK_PAGE.to_string());

        let window = self.window()?;
        window
            .frames
            .entry(position)
            .or_insert_with(|| MockPage::parse(&source));
        window.frame = Some(position);
        Ok(())
    }

    fn switch_to_default_content(&mut self) -> Result<()> {
        self.tick()?;
        self.window()?.frame = None;
        Ok(())
    }

    fn accept_alert(&mut self) -> Result<()> {
        self.tick()?;
        self.take_alert()?;
        self.alert_log.push(AlertEvent::Accepted);
        Ok(())
    }

    fn dismiss_alert(&mut self) -> Result<()> {
        self.tick()?;
        self.take_alert()?;
        self.alert_log.push(AlertEvent::Dismissed);
        Ok(())
    }

    fn authenticate_alert(&mut self, username: &str, password: &str) -> Result<()> {
        self.tick()?;
        self.take_alert()?;
        self.alert_log.push(AlertEvent::Authenticated {
            username: username.to_string(),
            password: password.to_string(),
        });
        Ok(())
    }

    fn page_source(&mut self) -> Result<String> {
        self.tick()?;
        Ok(self.document()?.source.clone())
    }

    fn quit(&mut self) -> Result<()> {
        self.quits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl MockDriver {
    fn take_alert(&mut self) -> Result<()> {
        if !self.alert {
            return Err(BrowserError::Driver("no such alert".to_string()));
        }
        self.alert = false;
        Ok(())
    }
}
