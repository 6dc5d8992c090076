//! In-memory device backend
//!
//! Behaves like a single PTP/IP camera reachable through a `ptpip:` port.
//! Every call is counted, any call can be made to fail, and every handle
//! handed out is tracked until it is released again.

use crate::backend::{BackendResult, CameraEventKind, Deadline, DeviceBackend, StatusCode, WidgetInput, WidgetKind};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Backend entry points, for counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockCall {
    ContextNew,
    ContextRelease,
    CameraNew,
    CameraRelease,
    SettingSet,
    AbilitiesListLoad,
    AbilitiesListRelease,
    AbilitiesLookupModel,
    AbilitiesGet,
    CameraSetAbilities,
    PortListLoad,
    PortListRelease,
    PortLookupPath,
    PortInfoGet,
    CameraSetPortInfo,
    CameraInit,
    CameraExit,
    ConfigFetch,
    ConfigCommit,
    ConfigRelease,
    WidgetSet,
    TriggerCapture,
    WaitForEvent,
}

/// One stored camera setting.
#[derive(Debug, Clone, PartialEq)]
pub struct MockWidget {
    pub kind: WidgetKind,
    pub text: String,
    pub float: f32,
    pub int: i32,
    pub range: (f32, f32, f32),
    pub choices: Vec<String>,
}

impl MockWidget {
    fn blank(kind: WidgetKind) -> Self {
        Self {
            kind,
            text: String::new(),
            float: 0.0,
            int: 0,
            range: (0.0, 0.0, 0.0),
            choices: Vec::new(),
        }
    }

    pub fn text(value: &str) -> Self {
        Self {
            text: value.to_string(),
            ..Self::blank(WidgetKind::Text)
        }
    }

    pub fn toggle(on: bool) -> Self {
        Self {
            int: i32::from(on),
            ..Self::blank(WidgetKind::Toggle)
        }
    }

    pub fn radio(value: &str, choices: &[&str]) -> Self {
        Self {
            text: value.to_string(),
            choices: choices.iter().map(|c| c.to_string()).collect(),
            ..Self::blank(WidgetKind::Radio)
        }
    }

    pub fn menu(value: &str, choices: &[&str]) -> Self {
        Self {
            kind: WidgetKind::Menu,
            ..Self::radio(value, choices)
        }
    }

    pub fn range(value: f32, min: f32, max: f32, step: f32) -> Self {
        Self {
            float: value,
            range: (min, max, step),
            ..Self::blank(WidgetKind::Range)
        }
    }

    pub fn date(secs: i32) -> Self {
        Self {
            int: secs,
            ..Self::blank(WidgetKind::Date)
        }
    }

    pub fn button() -> Self {
        Self::blank(WidgetKind::Button)
    }

    pub fn section() -> Self {
        Self::blank(WidgetKind::Section)
    }
}

pub type MockNode = Arc<Mutex<MockWidget>>;

fn node_guard(node: &MockNode) -> MutexGuard<'_, MockWidget> {
    node.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub struct MockContext {
    id: u64,
}

#[derive(Debug)]
pub struct MockCamera {
    id: u64,
    model: Option<String>,
    port: Option<String>,
}

#[derive(Debug)]
pub struct MockAbilitiesList {
    id: u64,
    models: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MockAbilities {
    pub model: String,
}

#[derive(Debug)]
pub struct MockPortList {
    id: u64,
}

#[derive(Debug, Clone)]
pub struct MockPortInfo {
    pub path: String,
}

/// A fetched configuration snapshot: a deep copy of the stored widgets.
#[derive(Debug)]
pub struct MockSnapshot {
    id: u64,
    widgets: BTreeMap<String, MockNode>,
}

#[derive(Debug, Default)]
struct MockState {
    widgets: BTreeMap<String, MockWidget>,
    models: Vec<String>,
    port_scheme: String,
    init_delay: Duration,
    failures: HashMap<MockCall, StatusCode>,
    counts: HashMap<MockCall, usize>,
    live: HashSet<String>,
    next_id: u64,
    settings: Vec<(String, String, String)>,
    events: VecDeque<CameraEventKind>,
}

impl MockState {
    fn allocate(&mut self, what: &str) -> u64 {
        self.next_id += 1;
        self.live.insert(format!("{what}#{}", self.next_id));
        self.next_id
    }

    fn free(&mut self, what: &str, id: u64) {
        if !self.live.remove(&format!("{what}#{id}")) {
            log::error!("Double release of {}#{}", what, id);
        }
    }
}

/// Scriptable stand-in for a device-control library.
#[derive(Debug)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBackend {
    /// A camera with no settings that answers to the default model tag.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                models: vec!["PTP/IP Camera".to_string()],
                port_scheme: "ptpip".to_string(),
                ..MockState::default()
            }),
        }
    }

    /// A camera carrying a representative subset of EOS settings.
    pub fn eos() -> Self {
        Self::new()
            .with_widget("capture", MockWidget::toggle(false))
            .with_widget(
                "capturetarget",
                MockWidget::menu("Internal RAM", &["Internal RAM", "Memory card"]),
            )
            .with_widget("aperture", MockWidget::radio("2.0", &["1.4", "2.0", "8.0", "11"]))
            .with_widget("iso", MockWidget::radio("Auto", &["Auto", "100", "200", "400", "800"]))
            .with_widget(
                "eosremoterelease",
                MockWidget::radio("None", &["None", "Press Half", "Press Full", "Immediate"]),
            )
            .with_widget("eosviewfinder", MockWidget::toggle(false))
            .with_widget("ownername", MockWidget::text(""))
            .with_widget("datetime", MockWidget::date(1_700_000_000))
            .with_widget("manualfocusdrive", MockWidget::range(0.0, -32.0, 32.0, 1.0))
            .with_widget("autofocusdrive", MockWidget::button())
            .with_widget("settings", MockWidget::section())
    }

    pub fn with_widget(self, name: &str, widget: MockWidget) -> Self {
        self.set_widget(name, widget);
        self
    }

    pub fn with_models(self, models: &[&str]) -> Self {
        self.state().models = models.iter().map(|m| m.to_string()).collect();
        self
    }

    /// Handshake duration. Longer than the caller's timeout means the
    /// handshake times out.
    pub fn with_init_delay(self, delay: Duration) -> Self {
        self.state().init_delay = delay;
        self
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn enter(&self, call: MockCall) -> BackendResult<MutexGuard<'_, MockState>> {
        let mut state = self.state();
        *state.counts.entry(call).or_insert(0) += 1;
        match state.failures.get(&call) {
            Some(status) => Err(*status),
            None => Ok(state),
        }
    }

    pub fn set_widget(&self, name: &str, widget: MockWidget) {
        self.state().widgets.insert(name.to_string(), widget);
    }

    /// The committed state of one setting.
    pub fn widget(&self, name: &str) -> Option<MockWidget> {
        self.state().widgets.get(name).cloned()
    }

    /// Make every later `call` fail with `status`.
    pub fn fail_on(&self, call: MockCall, status: StatusCode) {
        self.state().failures.insert(call, status);
    }

    pub fn clear_failure(&self, call: MockCall) {
        self.state().failures.remove(&call);
    }

    pub fn call_count(&self, call: MockCall) -> usize {
        self.state().counts.get(&call).copied().unwrap_or(0)
    }

    /// Number of handles handed out and not yet released.
    pub fn live_handles(&self) -> usize {
        self.state().live.len()
    }

    /// Entries written to the settings store, in order.
    pub fn recorded_settings(&self) -> Vec<(String, String, String)> {
        self.state().settings.clone()
    }

    /// Queue an event for `wait_for_event`.
    pub fn push_event(&self, event: CameraEventKind) {
        self.state().events.push_back(event);
    }
}

impl DeviceBackend for MockBackend {
    type Context = MockContext;
    type Camera = MockCamera;
    type AbilitiesList = MockAbilitiesList;
    type Abilities = MockAbilities;
    type PortList = MockPortList;
    type PortInfo = MockPortInfo;
    type Widget = MockSnapshot;
    type Node = MockNode;

    fn describe_status(&self, status: StatusCode) -> String {
        format!("mock: {}", status.default_description())
    }

    fn context_new(&self) -> BackendResult<MockContext> {
        let mut state = self.enter(MockCall::ContextNew)?;
        Ok(MockContext {
            id: state.allocate("context"),
        })
    }

    fn context_release(&self, context: MockContext) -> BackendResult<()> {
        self.state().free("context", context.id);
        self.enter(MockCall::ContextRelease).map(drop)
    }

    fn camera_new(&self) -> BackendResult<MockCamera> {
        let mut state = self.enter(MockCall::CameraNew)?;
        Ok(MockCamera {
            id: state.allocate("camera"),
            model: None,
            port: None,
        })
    }

    fn camera_release(&self, camera: MockCamera) -> BackendResult<()> {
        // The handle is gone whatever the outcome.
        self.state().free("camera", camera.id);
        self.enter(MockCall::CameraRelease).map(drop)
    }

    fn setting_set(&self, scope: &str, key: &str, value: &str) -> BackendResult<()> {
        let mut state = self.enter(MockCall::SettingSet)?;
        state
            .settings
            .push((scope.to_string(), key.to_string(), value.to_string()));
        Ok(())
    }

    fn abilities_list_load(&self, _context: &MockContext) -> BackendResult<MockAbilitiesList> {
        let mut state = self.enter(MockCall::AbilitiesListLoad)?;
        Ok(MockAbilitiesList {
            id: state.allocate("abilities"),
            models: state.models.clone(),
        })
    }

    fn abilities_list_release(&self, list: MockAbilitiesList) -> BackendResult<()> {
        self.state().free("abilities", list.id);
        self.enter(MockCall::AbilitiesListRelease).map(drop)
    }

    fn abilities_lookup_model(&self, list: &MockAbilitiesList, model: &str) -> BackendResult<usize> {
        let _state = self.enter(MockCall::AbilitiesLookupModel)?;
        list.models
            .iter()
            .position(|m| m == model)
            .ok_or(StatusCode::MODEL_NOT_FOUND)
    }

    fn abilities_get(&self, list: &MockAbilitiesList, index: usize) -> BackendResult<MockAbilities> {
        let _state = self.enter(MockCall::AbilitiesGet)?;
        list.models
            .get(index)
            .map(|model| MockAbilities { model: model.clone() })
            .ok_or(StatusCode::BAD_PARAMETERS)
    }

    fn camera_set_abilities(&self, camera: &mut MockCamera, abilities: &MockAbilities) -> BackendResult<()> {
        let _state = self.enter(MockCall::CameraSetAbilities)?;
        camera.model = Some(abilities.model.clone());
        Ok(())
    }

    fn port_list_load(&self) -> BackendResult<MockPortList> {
        let mut state = self.enter(MockCall::PortListLoad)?;
        Ok(MockPortList {
            id: state.allocate("ports"),
        })
    }

    fn port_list_release(&self, list: MockPortList) -> BackendResult<()> {
        self.state().free("ports", list.id);
        self.enter(MockCall::PortListRelease).map(drop)
    }

    fn port_lookup_path(&self, _list: &MockPortList, path: &[u8]) -> BackendResult<usize> {
        let state = self.enter(MockCall::PortLookupPath)?;
        let prefix = format!("{}:", state.port_scheme);
        if path.starts_with(prefix.as_bytes()) && path.len() > prefix.len() {
            Ok(0)
        } else {
            Err(StatusCode::UNKNOWN_PORT)
        }
    }

    fn port_info_get(&self, _list: &MockPortList, index: usize) -> BackendResult<MockPortInfo> {
        let state = self.enter(MockCall::PortInfoGet)?;
        if index != 0 {
            return Err(StatusCode::BAD_PARAMETERS);
        }
        Ok(MockPortInfo {
            path: format!("{}:", state.port_scheme),
        })
    }

    fn camera_set_port_info(&self, camera: &mut MockCamera, info: &MockPortInfo) -> BackendResult<()> {
        let _state = self.enter(MockCall::CameraSetPortInfo)?;
        camera.port = Some(info.path.clone());
        Ok(())
    }

    fn camera_init(&self, camera: &mut MockCamera, _context: &MockContext, timeout: Duration) -> BackendResult<()> {
        let deadline = Deadline::start(timeout);
        let delay = self.enter(MockCall::CameraInit)?.init_delay;
        if camera.model.is_none() || camera.port.is_none() {
            return Err(StatusCode::BAD_PARAMETERS);
        }
        match deadline.remaining() {
            Some(left) if delay <= left => {
                std::thread::sleep(delay);
                Ok(())
            }
            left => {
                std::thread::sleep(left.unwrap_or_default());
                Err(StatusCode::TIMEOUT)
            }
        }
    }

    fn camera_exit(&self, _camera: &mut MockCamera, _context: &MockContext) -> BackendResult<()> {
        self.enter(MockCall::CameraExit).map(drop)
    }

    fn config_fetch(&self, _camera: &mut MockCamera, _context: &MockContext) -> BackendResult<MockSnapshot> {
        let mut state = self.enter(MockCall::ConfigFetch)?;
        let widgets = state
            .widgets
            .iter()
            .map(|(name, widget)| (name.clone(), Arc::new(Mutex::new(widget.clone()))))
            .collect();
        Ok(MockSnapshot {
            id: state.allocate("snapshot"),
            widgets,
        })
    }

    fn config_commit(&self, _camera: &mut MockCamera, _context: &MockContext, root: &MockSnapshot) -> BackendResult<()> {
        let mut state = self.enter(MockCall::ConfigCommit)?;
        for (name, node) in &root.widgets {
            state.widgets.insert(name.clone(), node_guard(node).clone());
        }
        Ok(())
    }

    fn config_release(&self, root: MockSnapshot) -> BackendResult<()> {
        self.state().free("snapshot", root.id);
        self.enter(MockCall::ConfigRelease).map(drop)
    }

    fn widget_child_by_name(&self, root: &MockSnapshot, name: &str) -> BackendResult<MockNode> {
        root.widgets.get(name).cloned().ok_or(StatusCode::BAD_PARAMETERS)
    }

    fn widget_kind(&self, node: &MockNode) -> BackendResult<WidgetKind> {
        Ok(node_guard(node).kind)
    }

    fn widget_text(&self, node: &MockNode) -> BackendResult<String> {
        let widget = node_guard(node);
        match widget.kind {
            WidgetKind::Text | WidgetKind::Radio | WidgetKind::Menu => Ok(widget.text.clone()),
            _ => Err(StatusCode::BAD_PARAMETERS),
        }
    }

    fn widget_float(&self, node: &MockNode) -> BackendResult<f32> {
        let widget = node_guard(node);
        match widget.kind {
            WidgetKind::Range => Ok(widget.float),
            _ => Err(StatusCode::BAD_PARAMETERS),
        }
    }

    fn widget_int(&self, node: &MockNode) -> BackendResult<i32> {
        let widget = node_guard(node);
        match widget.kind {
            WidgetKind::Toggle | WidgetKind::Date => Ok(widget.int),
            _ => Err(StatusCode::BAD_PARAMETERS),
        }
    }

    fn widget_range(&self, node: &MockNode) -> BackendResult<(f32, f32, f32)> {
        let widget = node_guard(node);
        match widget.kind {
            WidgetKind::Range => Ok(widget.range),
            _ => Err(StatusCode::BAD_PARAMETERS),
        }
    }

    fn widget_choice_count(&self, node: &MockNode) -> BackendResult<usize> {
        let widget = node_guard(node);
        if widget.kind.is_choice() {
            Ok(widget.choices.len())
        } else {
            Err(StatusCode::BAD_PARAMETERS)
        }
    }

    fn widget_choice(&self, node: &MockNode, index: usize) -> BackendResult<String> {
        node_guard(node)
            .choices
            .get(index)
            .cloned()
            .ok_or(StatusCode::BAD_PARAMETERS)
    }

    fn widget_set(&self, node: &MockNode, value: &WidgetInput) -> BackendResult<()> {
        let _state = self.enter(MockCall::WidgetSet)?;
        let mut widget = node_guard(node);
        match (widget.kind, value) {
            (WidgetKind::Toggle | WidgetKind::Date, WidgetInput::Int(v)) => widget.int = *v,
            (WidgetKind::Range, WidgetInput::Float(v)) => widget.float = *v,
            (WidgetKind::Text | WidgetKind::Radio | WidgetKind::Menu, WidgetInput::Text(v)) => {
                widget.text = v.clone()
            }
            _ => return Err(StatusCode::BAD_PARAMETERS),
        }
        Ok(())
    }

    fn trigger_capture(&self, _camera: &mut MockCamera, _context: &MockContext) -> BackendResult<()> {
        let mut state = self.enter(MockCall::TriggerCapture)?;
        state.events.push_back(CameraEventKind::FileAdded);
        Ok(())
    }

    fn wait_for_event(
        &self,
        _camera: &mut MockCamera,
        _context: &MockContext,
        _timeout: Duration,
    ) -> BackendResult<CameraEventKind> {
        let mut state = self.enter(MockCall::WaitForEvent)?;
        Ok(state.events.pop_front().unwrap_or(CameraEventKind::Timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_tracked() {
        let backend = MockBackend::new();
        let context = backend.context_new().unwrap();
        let camera = backend.camera_new().unwrap();
        assert_eq!(backend.live_handles(), 2);

        backend.camera_release(camera).unwrap();
        backend.context_release(context).unwrap();
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn test_failure_injection_counts_the_call() {
        let backend = MockBackend::new();
        backend.fail_on(MockCall::CameraNew, StatusCode::NO_MEMORY);
        assert_eq!(backend.camera_new().unwrap_err(), StatusCode::NO_MEMORY);
        assert_eq!(backend.call_count(MockCall::CameraNew), 1);
        assert_eq!(backend.live_handles(), 0);

        backend.clear_failure(MockCall::CameraNew);
        assert!(backend.camera_new().is_ok());
    }

    #[test]
    fn test_widget_set_rejects_wrong_kind() {
        let backend = MockBackend::new();
        let node: MockNode = Arc::new(Mutex::new(MockWidget::toggle(false)));
        assert_eq!(
            backend.widget_set(&node, &WidgetInput::Text("on".into())),
            Err(StatusCode::BAD_PARAMETERS)
        );
        backend.widget_set(&node, &WidgetInput::Int(1)).unwrap();
        assert_eq!(backend.widget_int(&node), Ok(1));
    }

    #[test]
    fn test_port_lookup_requires_scheme() {
        let backend = MockBackend::new();
        let list = backend.port_list_load().unwrap();
        assert_eq!(backend.port_lookup_path(&list, b"ptpip:10.0.0.2"), Ok(0));
        assert_eq!(backend.port_lookup_path(&list, b"usb:001,004"), Err(StatusCode::UNKNOWN_PORT));
        assert_eq!(backend.port_lookup_path(&list, b"ptpip:"), Err(StatusCode::UNKNOWN_PORT));
        backend.port_list_release(list).unwrap();
    }
}
