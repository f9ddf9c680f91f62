//! In-process fixtures: the reference service behind a wire interceptor,
//! and a listener that records everything it hears.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use wmlink_ipc::codes::WindowManagerCode;
use wmlink_ipc::info::{
    AccessibilityWindowInfo, FocusChangeInfo, SystemBarRegionTint, WindowUpdateType,
    WindowVisibilityInfo,
};
use wmlink_ipc::types::{
    AvoidArea, AvoidAreaType, Rect, WindowMode, WindowSizeChangeReason, WindowType,
    INVALID_WINDOW_ID,
};
use wmlink_ipc::{
    CallMode, Parcel, RemoteObject, RemoteRef, StubObject, TransportError, WindowManagerStub,
    WindowProperty, WmError,
};

use crate::client::manager::{
    CameraFloatWindowChangedListener, FocusChangedListener, SystemBarChangedListener,
    VisibilityChangedListener, WindowUpdateListener,
};
use crate::client::window::{
    AvoidAreaChangedListener, LifecycleListener, WindowChangeListener, WindowDestroyListener,
};
use crate::client::{WindowAdapter, WindowImpl, WindowManager, WindowRegistry};
use crate::config::ServiceConfig;
use crate::service::WindowManagerServer;

/// Sits between the adapter and the service stub. Counts calls per code
/// and answers with an injected error where one is set.
pub struct Interceptor {
    inner: RemoteRef,
    calls: Mutex<HashMap<WindowManagerCode, usize>>,
    faults: Mutex<HashMap<WindowManagerCode, WmError>>,
    alive: AtomicBool,
}

impl Interceptor {
    pub fn new(inner: RemoteRef) -> Self {
        Self {
            inner,
            calls: Mutex::new(HashMap::new()),
            faults: Mutex::new(HashMap::new()),
            alive: AtomicBool::new(true),
        }
    }

    pub fn count(&self, code: WindowManagerCode) -> usize {
        self.calls.lock().get(&code).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.calls.lock().values().sum()
    }

    /// Answer `code` with `error` until healed. `IpcFailed` fails the
    /// transport itself.
    pub fn fail(&self, code: WindowManagerCode, error: WmError) {
        self.faults.lock().insert(code, error);
    }

    pub fn heal(&self, code: WindowManagerCode) {
        self.faults.lock().remove(&code);
    }

    /// Behave like a service that went away.
    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    fn fault_reply(code: WindowManagerCode, error: WmError, reply: &mut Parcel) -> Result<(), TransportError> {
        if error == WmError::IpcFailed {
            return Err(TransportError::Rejected);
        }
        match code {
            WindowManagerCode::CreateWindow | WindowManagerCode::GetTopWindowId => {
                reply.write_u32(INVALID_WINDOW_ID);
                reply.write_i32(error.code());
            }
            WindowManagerCode::RegisterAgent | WindowManagerCode::UnregisterAgent => {
                reply.write_bool(false);
            }
            WindowManagerCode::AddWindow
            | WindowManagerCode::RemoveWindow
            | WindowManagerCode::DestroyWindow
            | WindowManagerCode::RequestFocus
            | WindowManagerCode::ToggleShownStateForAllAppWindows
            | WindowManagerCode::UpdateLayoutMode
            | WindowManagerCode::UpdateProperty
            | WindowManagerCode::AnimationSetController
            | WindowManagerCode::GetModeChangeHotZones
            | WindowManagerCode::UpdateAvoidAreaListener => reply.write_i32(error.code()),
            _ => return Err(TransportError::Rejected),
        }
        Ok(())
    }
}

impl RemoteObject for Interceptor {
    fn send_request(
        &self,
        code: u32,
        data: &Parcel,
        reply: &mut Parcel,
        mode: CallMode,
    ) -> Result<(), TransportError> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(TransportError::DeadObject);
        }
        if let Ok(known) = WindowManagerCode::try_from(code) {
            *self.calls.lock().entry(known).or_default() += 1;
            let fault = self.faults.lock().get(&known).copied();
            if let Some(error) = fault {
                return Self::fault_reply(known, error, reply);
            }
        }
        self.inner.send_request(code, data, reply, mode)
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// One client process wired straight into a reference service.
pub struct Harness {
    pub server: Arc<WindowManagerServer>,
    pub wire: Arc<Interceptor>,
    pub adapter: Arc<WindowAdapter>,
    pub registry: Arc<WindowRegistry>,
    pub manager: Arc<WindowManager>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ServiceConfig::default())
    }

    pub fn with_config(config: ServiceConfig) -> Self {
        let server = Arc::new(WindowManagerServer::new(config));
        let stub = StubObject::into_remote(WindowManagerStub::new(Arc::clone(&server)));
        let wire = Arc::new(Interceptor::new(stub));
        let remote: RemoteRef = wire.clone();
        let adapter = Arc::new(WindowAdapter::with_remote(remote));
        let registry = Arc::new(WindowRegistry::new());
        let manager = WindowManager::new(Arc::clone(&adapter));
        Self {
            server,
            wire,
            adapter,
            registry,
            manager,
        }
    }

    /// Handle in `Initial` state.
    pub fn window(&self, name: &str, window_type: WindowType) -> Arc<WindowImpl> {
        WindowImpl::new(
            WindowProperty::new(name, window_type),
            Arc::clone(&self.adapter),
            Arc::clone(&self.registry),
        )
    }

    /// Floating app window, created and shown at `rect`.
    pub fn floating(&self, name: &str, rect: Rect) -> Arc<WindowImpl> {
        let mut property = WindowProperty::new(name, WindowType::AppMainWindow);
        property.set_mode(WindowMode::Floating);
        property.request_rect = rect;
        let window = WindowImpl::new(property, Arc::clone(&self.adapter), Arc::clone(&self.registry));
        window.create(INVALID_WINDOW_ID).unwrap();
        window
            .show(wmlink_ipc::types::WindowStateChangeReason::Normal, false)
            .unwrap();
        window
    }
}

/// Listener for every interface, logging each event as a line of text.
#[derive(Default)]
pub struct Events {
    lines: Mutex<Vec<String>>,
}

impl Events {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn record(&self, line: String) {
        self.lines.lock().push(line);
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.lines.lock().iter().filter(|l| l.starts_with(prefix)).count()
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }
}

impl WindowChangeListener for Events {
    fn on_size_change(&self, rect: Rect, reason: WindowSizeChangeReason) {
        self.record(format!(
            "size {} {} {} {} {:?}",
            rect.x, rect.y, rect.width, rect.height, reason
        ));
    }

    fn on_mode_change(&self, mode: WindowMode) {
        self.record(format!("mode {:?}", mode));
    }
}

impl AvoidAreaChangedListener for Events {
    fn on_avoid_area_changed(&self, area: AvoidArea, area_type: AvoidAreaType) {
        self.record(format!("avoid {:?} empty={}", area_type, area.is_empty()));
    }
}

impl LifecycleListener for Events {
    fn on_shown(&self) {
        self.record("shown".into());
    }

    fn on_hidden(&self) {
        self.record("hidden".into());
    }

    fn on_focused(&self) {
        self.record("focused".into());
    }

    fn on_unfocused(&self) {
        self.record("unfocused".into());
    }

    fn on_destroyed(&self) {
        self.record("destroyed".into());
    }
}

impl WindowDestroyListener for Events {
    fn on_window_destroyed(&self, name: &str) {
        self.record(format!("dying {}", name));
    }
}

impl FocusChangedListener for Events {
    fn on_focused(&self, info: &FocusChangeInfo) {
        self.record(format!("focus-in {}", info.window_id));
    }

    fn on_unfocused(&self, info: &FocusChangeInfo) {
        self.record(format!("focus-out {}", info.window_id));
    }
}

impl SystemBarChangedListener for Events {
    fn on_system_bar_property_change(&self, display_id: u64, tints: &[SystemBarRegionTint]) {
        self.record(format!("bars {} {}", display_id, tints.len()));
    }
}

impl WindowUpdateListener for Events {
    fn on_window_update(&self, infos: &[Arc<AccessibilityWindowInfo>], update_type: WindowUpdateType) {
        for info in infos {
            self.record(format!("update {:?} {}", update_type, info.window_id));
        }
    }
}

impl VisibilityChangedListener for Events {
    fn on_window_visibility_changed(&self, infos: &[Arc<WindowVisibilityInfo>]) {
        for info in infos {
            self.record(format!("visible {} {}", info.window_id, info.visible));
        }
    }
}

impl CameraFloatWindowChangedListener for Events {
    fn on_camera_float_window_change(&self, access_token_id: u32, is_showing: bool) {
        self.record(format!("camera {} {}", access_token_id, is_showing));
    }
}
