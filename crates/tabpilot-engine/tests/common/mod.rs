//! Shared fixtures: an in-memory browser and a scripted vision backend.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tabpilot_config::{EngineConfig, VisionConfig};
use tabpilot_engine::platform::{
    BrowserPlatform, HistoryDirection, LoadOutcome, MemoryStateStore, PlatformError, StateStore,
    TabId, TabInfo, WindowId,
};
use tabpilot_engine::resolver::{VisionBackend, VisionError};
use tabpilot_engine::{CommandExecutor, Session, scripts};

/// 1x1 transparent PNG.
pub const PNG: &str = "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

type ScriptHandler = Box<dyn Fn(&[Value]) -> Result<Value, PlatformError> + Send + Sync>;

/// Platform call as observed by the fake.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    GetTab(String),
    CreateWindow(String),
    FocusWindow(String),
    ActivateTab(String),
    LoadUrl(String),
    Reload,
    HistoryStep(HistoryDirection),
    Capture,
    Script(&'static str, Vec<Value>),
}

struct FakeTab {
    window: WindowId,
    url: String,
    back: Vec<String>,
    forward: Vec<String>,
}

#[derive(Default)]
struct FakeState {
    next_id: u32,
    tabs: HashMap<TabId, FakeTab>,
    calls: Vec<Call>,
    captures: VecDeque<Result<String, PlatformError>>,
    load_outcome: Option<LoadOutcome>,
    failing_hosts: Vec<String>,
    fail_create: bool,
    fail_focus: bool,
    fail_activate: bool,
    navigating_scripts: Vec<&'static str>,
    load_delay: Duration,
    loads_in_flight: usize,
    max_loads_in_flight: usize,
}

/// In-memory stand-in for a browser.
pub struct FakePlatform {
    state: Mutex<FakeState>,
    handlers: Mutex<HashMap<&'static str, ScriptHandler>>,
}

const SCRIPT_NAMES: &[(&str, &str)] = &[
    ("cursor_overlay", scripts::CURSOR_OVERLAY),
    ("detect_error_page", scripts::DETECT_ERROR_PAGE),
    ("click_first_result", scripts::CLICK_FIRST_RESULT),
    ("search", scripts::SEARCH),
    ("scroll", scripts::SCROLL),
    ("find_text", scripts::FIND_TEXT),
    ("collect_candidates", scripts::COLLECT_CANDIDATES),
    ("click_candidate", scripts::CLICK_CANDIDATE),
    ("click_at_point", scripts::CLICK_AT_POINT),
    ("text_click_fallback", scripts::TEXT_CLICK_FALLBACK),
    ("type_text", scripts::TYPE_TEXT),
    ("press_enter", scripts::PRESS_ENTER),
];

fn script_name(source: &str) -> &'static str {
    SCRIPT_NAMES
        .iter()
        .find(|(_, s)| *s == source)
        .map(|(name, _)| *name)
        .unwrap_or("unknown")
}

impl FakePlatform {
    pub fn new() -> Arc<Self> {
        let fake = Self {
            state: Mutex::new(FakeState::default()),
            handlers: Mutex::new(HashMap::new()),
        };
        fake.on_script("cursor_overlay", |_| Ok(json!(true)));
        fake.on_script("detect_error_page", |_| Ok(json!(false)));
        fake.on_script("collect_candidates", |_| Ok(json!([])));
        fake.on_script("click_candidate", |_| Ok(json!(true)));
        fake.on_script("click_at_point", |_| Ok(json!(true)));
        fake.on_script("text_click_fallback", |_| Ok(json!(false)));
        fake.on_script("scroll", |_| Ok(json!({"x": 0, "y": 300})));
        Arc::new(fake)
    }

    /// Replace the reply for the named script.
    pub fn on_script<F>(&self, name: &'static str, handler: F)
    where
        F: Fn(&[Value]) -> Result<Value, PlatformError> + Send + Sync + 'static,
    {
        self.handlers.lock().insert(name, Box::new(handler));
    }

    /// Queue capture results. Once drained, captures succeed with [`PNG`].
    pub fn queue_captures(&self, results: Vec<Result<String, PlatformError>>) {
        self.state.lock().captures.extend(results);
    }

    pub fn set_load_outcome(&self, outcome: LoadOutcome) {
        self.state.lock().load_outcome = Some(outcome);
    }

    /// Loads of URLs containing `host` fail like a DNS error.
    pub fn fail_host(&self, host: &str) {
        self.state.lock().failing_hosts.push(host.to_string());
    }

    pub fn fail_create(&self) {
        self.state.lock().fail_create = true;
    }

    pub fn fail_focus(&self) {
        self.state.lock().fail_focus = true;
    }

    pub fn fail_activate(&self) {
        self.state.lock().fail_activate = true;
    }

    /// A string returned by the named script becomes the tab's URL, like a
    /// link the page followed.
    pub fn navigates_on(&self, name: &'static str) {
        self.state.lock().navigating_scripts.push(name);
    }

    pub fn set_load_delay(&self, delay: Duration) {
        self.state.lock().load_delay = delay;
    }

    pub fn max_loads_in_flight(&self) -> usize {
        self.state.lock().max_loads_in_flight
    }

    /// Open a tab as if the user did, outside engine control.
    pub fn open_tab(&self, url: &str) -> TabId {
        let mut state = self.state.lock();
        Self::insert_tab(&mut state, url)
    }

    pub fn close_tab(&self, tab_id: &TabId) {
        self.state.lock().tabs.remove(tab_id);
    }

    /// Simulate the user steering the tab somewhere.
    pub fn set_url(&self, tab_id: &TabId, url: &str) {
        if let Some(tab) = self.state.lock().tabs.get_mut(tab_id) {
            tab.url = url.to_string();
        }
    }

    pub fn url_of(&self, tab_id: &TabId) -> Option<String> {
        self.state.lock().tabs.get(tab_id).map(|t| t.url.clone())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn loads(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::LoadUrl(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    pub fn script_calls(&self, name: &str) -> Vec<Vec<Value>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Script(n, args) if n == name => Some(args),
                _ => None,
            })
            .collect()
    }

    fn insert_tab(state: &mut FakeState, url: &str) -> TabId {
        state.next_id += 1;
        let tab_id = TabId::new(format!("T{}", state.next_id));
        state.tabs.insert(
            tab_id.clone(),
            FakeTab {
                window: WindowId::new(format!("W{}", state.next_id)),
                url: url.to_string(),
                back: Vec::new(),
                forward: Vec::new(),
            },
        );
        tab_id
    }

    fn record(&self, call: Call) {
        self.state.lock().calls.push(call);
    }
}

#[async_trait]
impl BrowserPlatform for FakePlatform {
    async fn get_tab(&self, tab_id: &TabId) -> Result<TabInfo, PlatformError> {
        self.record(Call::GetTab(tab_id.to_string()));
        let state = self.state.lock();
        let tab = state
            .tabs
            .get(tab_id)
            .ok_or_else(|| PlatformError::TabNotFound(tab_id.to_string()))?;
        Ok(TabInfo {
            tab_id: tab_id.clone(),
            window_id: tab.window.clone(),
            url: tab.url.clone(),
        })
    }

    async fn create_window(&self, url: &str) -> Result<TabInfo, PlatformError> {
        self.record(Call::CreateWindow(url.to_string()));
        let mut state = self.state.lock();
        if state.fail_create {
            return Err(PlatformError::Request("window quota exceeded".to_string()));
        }
        let tab_id = Self::insert_tab(&mut state, url);
        let tab = &state.tabs[&tab_id];
        Ok(TabInfo {
            tab_id: tab_id.clone(),
            window_id: tab.window.clone(),
            url: tab.url.clone(),
        })
    }

    async fn focus_window(&self, window_id: &WindowId) -> Result<(), PlatformError> {
        self.record(Call::FocusWindow(window_id.to_string()));
        if self.state.lock().fail_focus {
            return Err(PlatformError::Request("window is gone".to_string()));
        }
        Ok(())
    }

    async fn activate_tab(&self, tab_id: &TabId) -> Result<(), PlatformError> {
        self.record(Call::ActivateTab(tab_id.to_string()));
        if self.state.lock().fail_activate {
            return Err(PlatformError::Request("tab cannot be activated".to_string()));
        }
        Ok(())
    }

    async fn load_url(
        &self,
        tab_id: &TabId,
        url: &str,
        _deadline: Duration,
    ) -> Result<LoadOutcome, PlatformError> {
        self.record(Call::LoadUrl(url.to_string()));
        let delay = {
            let mut state = self.state.lock();
            if state.failing_hosts.iter().any(|h| url.contains(h.as_str())) {
                return Err(PlatformError::NavigationFailed(
                    "net::ERR_NAME_NOT_RESOLVED".to_string(),
                ));
            }
            state.loads_in_flight += 1;
            state.max_loads_in_flight = state.max_loads_in_flight.max(state.loads_in_flight);
            state.load_delay
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        state.loads_in_flight -= 1;
        let outcome = state.load_outcome.unwrap_or(LoadOutcome::Completed);
        let tab = state
            .tabs
            .get_mut(tab_id)
            .ok_or_else(|| PlatformError::TabNotFound(tab_id.to_string()))?;
        let previous = std::mem::replace(&mut tab.url, url.to_string());
        tab.back.push(previous);
        tab.forward.clear();
        Ok(outcome)
    }

    async fn reload(
        &self,
        tab_id: &TabId,
        _deadline: Duration,
    ) -> Result<LoadOutcome, PlatformError> {
        self.record(Call::Reload);
        let state = self.state.lock();
        if !state.tabs.contains_key(tab_id) {
            return Err(PlatformError::TabNotFound(tab_id.to_string()));
        }
        Ok(LoadOutcome::Completed)
    }

    async fn history_step(
        &self,
        tab_id: &TabId,
        direction: HistoryDirection,
    ) -> Result<bool, PlatformError> {
        self.record(Call::HistoryStep(direction));
        let mut state = self.state.lock();
        let tab = state
            .tabs
            .get_mut(tab_id)
            .ok_or_else(|| PlatformError::TabNotFound(tab_id.to_string()))?;
        let (from, to) = match direction {
            HistoryDirection::Back => (&mut tab.back, &mut tab.forward),
            HistoryDirection::Forward => (&mut tab.forward, &mut tab.back),
        };
        let Some(next) = from.pop() else {
            return Ok(false);
        };
        to.push(std::mem::replace(&mut tab.url, next));
        Ok(true)
    }

    async fn capture_visible(&self, _tab_id: &TabId) -> Result<String, PlatformError> {
        self.record(Call::Capture);
        self.state
            .lock()
            .captures
            .pop_front()
            .unwrap_or_else(|| Ok(PNG.to_string()))
    }

    async fn execute_script(
        &self,
        tab_id: &TabId,
        function: &str,
        args: &[Value],
    ) -> Result<Value, PlatformError> {
        let name = script_name(function);
        self.record(Call::Script(name, args.to_vec()));
        let result = match self.handlers.lock().get(name) {
            Some(handler) => handler(args),
            None => Ok(Value::Null),
        };
        if let Ok(Value::String(url)) = &result {
            let mut state = self.state.lock();
            if state.navigating_scripts.contains(&name) {
                if let Some(tab) = state.tabs.get_mut(tab_id) {
                    let previous = std::mem::replace(&mut tab.url, url.clone());
                    tab.back.push(previous);
                    tab.forward.clear();
                }
            }
        }
        result
    }
}

/// Vision backend that replays queued responses.
#[derive(Default)]
pub struct FakeVision {
    responses: Mutex<VecDeque<Result<String, VisionError>>>,
    prompts: Mutex<Vec<String>>,
}

impl FakeVision {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn respond(&self, response: Result<String, VisionError>) {
        self.responses.lock().push_back(response);
    }

    /// Queue a well-formed match at the given point.
    pub fn respond_match(&self, x: f64, y: f64, confidence: f64) {
        self.respond(Ok(format!(
            r#"{{"location": {{"x": {x}, "y": {y}}}, "description": "match", "confidence": {confidence}, "reasoning": "test"}}"#
        )));
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().len()
    }
}

#[async_trait]
impl VisionBackend for FakeVision {
    async fn analyze(&self, _image_base64: &str, prompt: &str) -> Result<String, VisionError> {
        self.prompts.lock().push(prompt.to_string());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(VisionError::Network("no scripted response".to_string())))
    }
}

/// Test harness bundling the fakes with a session.
pub struct Harness {
    pub platform: Arc<FakePlatform>,
    pub vision: Arc<FakeVision>,
    pub store: Arc<MemoryStateStore>,
    pub executor: CommandExecutor,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::without_delays())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let platform = FakePlatform::new();
        let vision = FakeVision::new();
        let store = Arc::new(MemoryStateStore::new());
        let session = Session::new(
            platform.clone(),
            store.clone() as Arc<dyn StateStore>,
            Some(vision.clone() as Arc<dyn VisionBackend>),
            config,
            &VisionConfig::default(),
        );
        Self {
            platform,
            vision,
            store,
            executor: CommandExecutor::new(session),
        }
    }

    pub fn session(&self) -> &Session {
        self.executor.session()
    }

    /// Current controlled tab id, creating one if needed.
    pub async fn tab_id(&self) -> TabId {
        self.session()
            .tabs
            .ensure_active()
            .await
            .expect("controlled tab")
            .tab_id
    }
}

/// Candidate descriptor as the collection script returns it.
pub fn candidate(index: usize, text: &str) -> Value {
    json!({
        "index": index,
        "tag": "button",
        "text": text,
        "ariaLabel": null,
        "title": null,
        "alt": null,
        "placeholder": null
    })
}
