//! Notification agents registered with the service, one table per category.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};
use wmlink_ipc::agent::WindowManagerAgentProxy;
use wmlink_ipc::info::{
    AccessibilityWindowInfo, FocusChangeInfo, SystemBarRegionTint, WindowUpdateType,
    WindowVisibilityInfo,
};
use wmlink_ipc::transport::same_object;
use wmlink_ipc::types::WindowManagerAgentType;
use wmlink_ipc::{RemoteRef, TransportError};

#[derive(Default)]
pub struct AgentTable {
    agents: Mutex<HashMap<WindowManagerAgentType, Vec<RemoteRef>>>,
}

impl AgentTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `agent` unless the same object is already registered for `kind`.
    pub fn register(&self, kind: WindowManagerAgentType, agent: RemoteRef) -> bool {
        let mut agents = self.agents.lock();
        let list = agents.entry(kind).or_default();
        if list.iter().any(|a| same_object(a, &agent)) {
            debug!("{:?} agent already registered", kind);
            return true;
        }
        list.push(agent);
        info!("registered {:?} agent ({} total)", kind, list.len());
        true
    }

    pub fn unregister(&self, kind: WindowManagerAgentType, agent: &RemoteRef) -> bool {
        let mut agents = self.agents.lock();
        let Some(list) = agents.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|a| !same_object(a, agent));
        let removed = list.len() != before;
        if removed {
            info!("unregistered {:?} agent ({} left)", kind, list.len());
        } else {
            warn!("{:?} agent was not registered", kind);
        }
        removed
    }

    pub fn count(&self, kind: WindowManagerAgentType) -> usize {
        self.agents.lock().get(&kind).map_or(0, Vec::len)
    }

    /// Live agents of `kind`. Agents whose peer is gone are dropped here.
    fn targets(&self, kind: WindowManagerAgentType) -> Vec<WindowManagerAgentProxy> {
        let mut agents = self.agents.lock();
        let Some(list) = agents.get_mut(&kind) else {
            return Vec::new();
        };
        let before = list.len();
        list.retain(|agent| agent.is_alive());
        if list.len() != before {
            debug!("pruned {} dead {:?} agents", before - list.len(), kind);
        }
        list.iter()
            .map(|agent| WindowManagerAgentProxy::new(Arc::clone(agent)))
            .collect()
    }

    fn deliver(
        &self,
        kind: WindowManagerAgentType,
        push: impl Fn(&WindowManagerAgentProxy) -> Result<(), TransportError>,
    ) {
        for target in self.targets(kind) {
            match push(&target) {
                Ok(()) => {}
                Err(TransportError::DeadObject) => {
                    warn!("{:?} agent died, dropping it", kind);
                    self.unregister(kind, target.remote());
                }
                Err(e) => warn!("{:?} push failed: {}", kind, e),
            }
        }
    }

    pub fn notify_focus(&self, info: &FocusChangeInfo, focused: bool) {
        self.deliver(WindowManagerAgentType::Focus, |agent| {
            agent.update_focus_change_info(info, focused)
        });
    }

    pub fn notify_system_bar(&self, display_id: u64, tints: &[SystemBarRegionTint]) {
        self.deliver(WindowManagerAgentType::SystemBar, |agent| {
            agent.update_system_bar_region_tints(display_id, tints)
        });
    }

    pub fn notify_window_update(
        &self,
        infos: &[Arc<AccessibilityWindowInfo>],
        update_type: WindowUpdateType,
    ) {
        self.deliver(WindowManagerAgentType::WindowUpdate, |agent| {
            agent.notify_accessibility_window_info(infos, update_type)
        });
    }

    pub fn notify_visibility(&self, infos: &[Arc<WindowVisibilityInfo>]) {
        self.deliver(WindowManagerAgentType::WindowVisibility, |agent| {
            agent.update_window_visibility_info(infos)
        });
    }

    pub fn notify_camera_float(&self, access_token_id: u32, showing: bool) {
        self.deliver(WindowManagerAgentType::CameraFloat, |agent| {
            agent.update_camera_float_window_status(access_token_id, showing)
        });
    }
}
