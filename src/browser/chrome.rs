use crate::core::{BrowserConfig, BrowserDriver, FrameRef};
use crate::dom::SelectorKind;
use crate::errors::{BrowserError, Result};
use headless_chrome::browser::tab::NoElementFound;
use headless_chrome::protocol::cdp::DOM;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Chromium backend over the DevTools protocol.
///
/// Element handles are DOM node ids of the current document, or of the
/// current frame's document after [`BrowserDriver::switch_to_frame`].
pub struct ChromeDriver {
    browser: Option<Browser>,
    tab: Option<Arc<Tab>>,
    frame_root: Option<DOM::NodeId>,
    closed: HashSet<String>,
}

impl ChromeDriver {
    pub fn launch(config: &BrowserConfig) -> Result<Self> {
        let window_size_arg = format!(
            "--window-size={},{}",
            config.viewport.width, config.viewport.height
        );

        let user_agent_arg = config
            .user_agent
            .as_ref()
            .map(|ua| format!("--user-agent={}", ua));

        let mut args = vec![
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new(&window_size_arg),
        ];

        if let Some(ref ua_arg) = user_agent_arg {
            args.push(OsStr::new(ua_arg));
        }

        if config.disable_images {
            args.push(OsStr::new("--blink-settings=imagesEnabled=false"));
        }

        for arg in &config.args {
            args.push(OsStr::new(arg));
        }

        let launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .window_size(Some((config.viewport.width, config.viewport.height)))
            .path(config.chrome_path.as_ref().map(PathBuf::from))
            .idle_browser_timeout(Duration::from_millis(config.idle_timeout_ms))
            .args(args)
            .build()
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let browser =
            Browser::new(launch_options).map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let tab = browser
            .new_tab()
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let mut driver = Self {
            browser: Some(browser),
            tab: Some(Arc::clone(&tab)),
            frame_root: None,
            closed: HashSet::new(),
        };

        // Chrome opens its own blank tab on startup; only ours should count as a window.
        for stale in driver.tabs()? {
            if stale.get_target_id() != tab.get_target_id() {
                if let Err(e) = stale.close(false) {
                    warn!(tab = %stale.get_target_id(), error = %e, "Failed to close startup tab");
                }
                driver.closed.insert(stale.get_target_id().clone());
            }
        }

        info!(headless = config.headless, "Chrome launched");
        Ok(driver)
    }

    fn browser(&self) -> Result<&Browser> {
        self.browser.as_ref().ok_or(BrowserError::SessionClosed)
    }

    fn tab(&self) -> Result<Arc<Tab>> {
        self.tab
            .clone()
            .ok_or_else(|| BrowserError::NoSuchWindow("no current window".to_string()))
    }

    fn tabs(&self) -> Result<Vec<Arc<Tab>>> {
        let browser = self.browser()?;
        browser.register_missing_tabs();
        let tabs = browser
            .get_tabs()
            .lock()
            .map_err(|_| BrowserError::Driver("tab registry is poisoned".to_string()))?;
        Ok(tabs
            .iter()
            .filter(|tab| !self.closed.contains(tab.get_target_id()))
            .cloned()
            .collect())
    }

    fn root(&self, tab: &Tab) -> Result<DOM::NodeId> {
        match self.frame_root {
            Some(root) => Ok(root),
            None => Ok(tab.get_document()?.node_id),
        }
    }
}

fn element_error(err: anyhow::Error) -> BrowserError {
    if err.downcast_ref::<NoElementFound>().is_some() {
        BrowserError::NoSuchElement(err.to_string())
    } else {
        BrowserError::Driver(err.to_string())
    }
}

fn element<'a>(tab: &'a Tab, node_id: &DOM::NodeId) -> Result<Element<'a>> {
    Element::new(tab, *node_id).map_err(element_error)
}

// DOM.getSearchResults rejects an empty range, so a search without hits
// never asks for results. Every search is discarded once read.
fn xpath_search(tab: &Tab, query: &str) -> Result<Vec<DOM::NodeId>> {
    tab.get_document()?;
    let search = tab.call_method(DOM::PerformSearch {
        query: query.to_string(),
        include_user_agent_shadow_dom: None,
    })?;

    let found = if search.result_count == 0 {
        Ok(Vec::new())
    } else {
        tab.call_method(DOM::GetSearchResults {
            search_id: search.search_id.clone(),
            from_index: 0,
            to_index: search.result_count,
        })
        .map(|results| {
            results
                .node_ids
                .into_iter()
                .filter(|id| *id != 0)
                .collect()
        })
        .map_err(element_error)
    };

    if let Err(e) = tab.call_method(DOM::DiscardSearchResults {
        search_id: search.search_id,
    }) {
        warn!(error = %e, "Failed to discard xpath search results");
    }
    found
}

fn quoted(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn call(element: &Element<'_>, function: &str, args: Vec<Value>) -> Result<Option<Value>> {
    Ok(element
        .call_js_fn(function, args, false)
        .map_err(element_error)?
        .value)
}

const CLEAR_JS: &str = "function() {
    this.value = '';
    this.dispatchEvent(new Event('input', { bubbles: true }));
    this.dispatchEvent(new Event('change', { bubbles: true }));
}";

const ATTRIBUTE_JS: &str = "function(name) {
    const value = (name in this) ? this[name] : this.getAttribute(name);
    return value === null || value === undefined ? null : String(value);
}";

const SELECT_OPTION_JS: &str = "function() {
    this.selected = true;
    const select = this.closest('select');
    if (select) {
        select.dispatchEvent(new Event('input', { bubbles: true }));
        select.dispatchEvent(new Event('change', { bubbles: true }));
    }
}";

const SELECTED_JS: &str = "function() { return !!(this.checked || this.selected); }";

const SOURCE_JS: &str =
    "function() { return this.documentElement ? this.documentElement.outerHTML : ''; }";

impl BrowserDriver for ChromeDriver {
    type Element = DOM::NodeId;

    fn navigate(&mut self, url: &str) -> Result<()> {
        let tab = self.tab()?;
        tab.navigate_to(url)?.wait_until_navigated()?;
        self.frame_root = None;
        Ok(())
    }

    fn find_all(&mut self, kind: SelectorKind, query: &str) -> Result<Vec<DOM::NodeId>> {
        let tab = self.tab()?;

        let css = match kind {
            SelectorKind::Css => query.to_string(),
            SelectorKind::Id => format!("[id=\"{}\"]", quoted(query)),
            SelectorKind::Name => format!("[name=\"{}\"]", quoted(query)),
            SelectorKind::Class => format!("[class~=\"{}\"]", quoted(query)),
            SelectorKind::Link => "a".to_string(),
            SelectorKind::XPath => {
                if self.frame_root.is_some() {
                    return Err(BrowserError::UnsupportedSelectorKind(
                        "xpath inside frames".to_string(),
                    ));
                }
                return xpath_search(&tab, query);
            }
        };

        let root = self.root(&tab)?;
        let found = tab
            .run_query_selector_all_on_node(root, &css)
            .map_err(element_error)?;

        if kind == SelectorKind::Link {
            let mut links = Vec::new();
            for el in &found {
                if el.get_inner_text().map_err(element_error)?.trim() == query {
                    links.push(el.node_id);
                }
            }
            return Ok(links);
        }

        debug!(selector = %css, matches = found.len(), "Query resolved");
        Ok(found.iter().map(|el| el.node_id).collect())
    }

    fn tag_name(&mut self, node: &DOM::NodeId) -> Result<String> {
        let tab = self.tab()?;
        Ok(element(&tab, node)?.tag_name.to_lowercase())
    }

    fn click(&mut self, node: &DOM::NodeId) -> Result<()> {
        let tab = self.tab()?;
        let el = element(&tab, node)?;
        // Options of a closed <select> have no box to click on.
        if el.tag_name.eq_ignore_ascii_case("option") {
            call(&el, SELECT_OPTION_JS, vec![])?;
        } else {
            el.click().map_err(element_error)?;
        }
        Ok(())
    }

    fn clear(&mut self, node: &DOM::NodeId) -> Result<()> {
        let tab = self.tab()?;
        call(&element(&tab, node)?, CLEAR_JS, vec![])?;
        Ok(())
    }

    fn send_text(&mut self, node: &DOM::NodeId, text: &str) -> Result<()> {
        let tab = self.tab()?;
        element(&tab, node)?
            .type_into(text)
            .map_err(element_error)?;
        Ok(())
    }

    fn attribute(&mut self, node: &DOM::NodeId, name: &str) -> Result<Option<String>> {
        let tab = self.tab()?;
        let value = call(&element(&tab, node)?, ATTRIBUTE_JS, vec![json!(name)])?;
        Ok(match value {
            Some(Value::String(s)) => Some(s),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        })
    }

    fn text(&mut self, node: &DOM::NodeId) -> Result<String> {
        let tab = self.tab()?;
        element(&tab, node)?
            .get_inner_text()
            .map_err(element_error)
    }

    fn is_selected(&mut self, node: &DOM::NodeId) -> Result<bool> {
        let tab = self.tab()?;
        let value = call(&element(&tab, node)?, SELECTED_JS, vec![])?;
        Ok(value.and_then(|v| v.as_bool()).unwrap_or(false))
    }

    fn options(&mut self, select: &DOM::NodeId) -> Result<Vec<DOM::NodeId>> {
        let tab = self.tab()?;
        let found = tab
            .run_query_selector_all_on_node(*select, "option")
            .map_err(element_error)?;
        Ok(found.iter().map(|el| el.node_id).collect())
    }

    fn window_handles(&mut self) -> Result<Vec<String>> {
        Ok(self
            .tabs()?
            .iter()
            .map(|tab| tab.get_target_id().clone())
            .collect())
    }

    fn current_window(&mut self) -> Result<String> {
        Ok(self.tab()?.get_target_id().clone())
    }

    fn switch_to_window(&mut self, handle: &str) -> Result<()> {
        let tab = self
            .tabs()?
            .into_iter()
            .find(|tab| tab.get_target_id() == handle)
            .ok_or_else(|| BrowserError::NoSuchWindow(format!("no window with handle {}", handle)))?;
        tab.activate()?;
        self.tab = Some(tab);
        self.frame_root = None;
        Ok(())
    }

    fn title(&mut self) -> Result<String> {
        Ok(self.tab()?.get_title()?)
    }

    fn current_url(&mut self) -> Result<String> {
        Ok(self.tab()?.get_url())
    }

    fn close_window(&mut self) -> Result<()> {
        let tab = self.tab()?;
        tab.close(false)?;
        self.closed.insert(tab.get_target_id().clone());
        self.tab = None;
        self.frame_root = None;
        Ok(())
    }

    fn switch_to_frame(&mut self, frame: &FrameRef) -> Result<()> {
        let tab = self.tab()?;
        let root = self.root(&tab)?;

        let query = match frame {
            FrameRef::Index(_) => "iframe, frame".to_string(),
            FrameRef::Name(name) => {
                let name = quoted(name);
                format!(
                    "iframe[id=\"{0}\"], iframe[name=\"{0}\"], frame[id=\"{0}\"], frame[name=\"{0}\"]",
                    name
                )
            }
        };
        let frames = tab
            .run_query_selector_all_on_node(root, &query)
            .map_err(element_error)?;
        let position = match frame {
            FrameRef::Index(index) => *index,
            FrameRef::Name(_) => 0,
        };
        let frame_element = frames
            .get(position)
            .ok_or_else(|| BrowserError::NoSuchFrame(format!("no frame matching {}", frame)))?;

        let document = tab
            .describe_node(frame_element.node_id)?
            .content_document
            .ok_or_else(|| {
                BrowserError::NoSuchFrame(format!("frame {} has no accessible document", frame))
            })?;
        let node_ids = tab
            .call_method(DOM::PushNodesByBackendIdsToFrontend {
                backend_node_ids: vec![document.backend_node_id],
            })?
            .node_ids;

        self.frame_root = Some(
            node_ids
                .first()
                .copied()
                .ok_or_else(|| BrowserError::NoSuchFrame(format!("frame {} is detached", frame)))?,
        );
        Ok(())
    }

    fn switch_to_default_content(&mut self) -> Result<()> {
        self.frame_root = None;
        Ok(())
    }

    fn accept_alert(&mut self) -> Result<()> {
        self.tab()?.get_dialog().accept(None)?;
        Ok(())
    }

    fn dismiss_alert(&mut self) -> Result<()> {
        self.tab()?.get_dialog().dismiss()?;
        Ok(())
    }

    fn authenticate_alert(&mut self, username: &str, password: &str) -> Result<()> {
        let tab = self.tab()?;
        tab.enable_fetch(None, Some(true))?;
        tab.authenticate(Some(username.to_string()), Some(password.to_string()))?;
        Ok(())
    }

    fn page_source(&mut self) -> Result<String> {
        let tab = self.tab()?;
        match self.frame_root {
            Some(root) => {
                let value = call(&element(&tab, &root)?, SOURCE_JS, vec![])?;
                Ok(value
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default())
            }
            None => Ok(tab.get_content()?),
        }
    }

    fn quit(&mut self) -> Result<()> {
        self.tab = None;
        self.frame_root = None;
        if self.browser.take().is_some() {
            info!("Chrome closed");
        }
        Ok(())
    }
}
