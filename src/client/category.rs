//! Listener bookkeeping shared by the process-wide manager and window handles.
//!
//! Listeners are compared by allocation, so the same `Arc` registered twice
//! is one listener. Broadcasts take a snapshot under the lock and invoke it
//! after the lock is released, so a callback may register or unregister.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};
use wmlink_ipc::types::WindowManagerAgentType;
use wmlink_ipc::RemoteRef;

use super::adapter::WindowAdapter;

pub(crate) fn same_listener<L: ?Sized>(a: &Arc<L>, b: &Arc<L>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Plain listener list with no remote side.
pub struct ListenerList<L: ?Sized> {
    listeners: Mutex<Vec<Arc<L>>>,
}

impl<L: ?Sized> Default for ListenerList<L> {
    fn default() -> Self {
        Self {
            listeners: Mutex::new(Vec::new()),
        }
    }
}

impl<L: ?Sized> ListenerList<L> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the list length after the call, or `None` if already present.
    pub fn add(&self, listener: Arc<L>) -> Option<usize> {
        let mut listeners = self.listeners.lock();
        if listeners.iter().any(|l| same_listener(l, &listener)) {
            return None;
        }
        listeners.push(listener);
        Some(listeners.len())
    }

    /// Returns the list length after the call, or `None` if not present.
    pub fn remove(&self, listener: &Arc<L>) -> Option<usize> {
        let mut listeners = self.listeners.lock();
        let pos = listeners.iter().position(|l| same_listener(l, listener))?;
        listeners.remove(pos);
        Some(listeners.len())
    }

    pub fn snapshot(&self) -> Vec<Arc<L>> {
        self.listeners.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.listeners.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.lock().is_empty()
    }
}

struct CategoryState<L: ?Sized> {
    agent: Option<RemoteRef>,
    listeners: Vec<Arc<L>>,
}

/// Listeners of one event category plus the agent registered for them.
///
/// The agent exists exactly while the list is non-empty (modulo a failed
/// unregister, which still drops the local reference).
pub struct ListenerCategory<L: ?Sized> {
    kind: WindowManagerAgentType,
    state: Mutex<CategoryState<L>>,
}

impl<L: ?Sized> ListenerCategory<L> {
    pub fn new(kind: WindowManagerAgentType) -> Self {
        Self {
            kind,
            state: Mutex::new(CategoryState {
                agent: None,
                listeners: Vec::new(),
            }),
        }
    }

    pub fn kind(&self) -> WindowManagerAgentType {
        self.kind
    }

    pub fn register(
        &self,
        listener: Arc<L>,
        adapter: &WindowAdapter,
        make_agent: impl FnOnce() -> RemoteRef,
    ) -> bool {
        let mut state = self.state.lock();
        if state.agent.is_none() {
            let agent = make_agent();
            if !adapter.register_window_manager_agent(self.kind, &agent) {
                warn!("failed to register {:?} agent", self.kind);
                adapter.release_object(&agent);
                return false;
            }
            debug!("registered {:?} agent", self.kind);
            state.agent = Some(agent);
        }
        if state.listeners.iter().any(|l| same_listener(l, &listener)) {
            debug!("{:?} listener already registered", self.kind);
            return true;
        }
        state.listeners.push(listener);
        true
    }

    pub fn unregister(&self, listener: &Arc<L>, adapter: &WindowAdapter) -> bool {
        let mut state = self.state.lock();
        let Some(pos) = state.listeners.iter().position(|l| same_listener(l, listener)) else {
            debug!("{:?} listener was not registered", self.kind);
            return true;
        };
        state.listeners.remove(pos);
        if !state.listeners.is_empty() {
            return true;
        }
        let Some(agent) = state.agent.take() else {
            return true;
        };
        let unregistered = adapter.unregister_window_manager_agent(self.kind, &agent);
        adapter.release_object(&agent);
        if unregistered {
            debug!("unregistered {:?} agent", self.kind);
        } else {
            warn!("failed to unregister {:?} agent", self.kind);
        }
        unregistered
    }

    pub fn snapshot(&self) -> Vec<Arc<L>> {
        self.state.lock().listeners.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    pub fn has_agent(&self) -> bool {
        self.state.lock().agent.is_some()
    }

    /// Drop the agent after the service went away. Listeners stay; the
    /// next registration brings a fresh agent.
    pub fn reset_agent(&self, adapter: &WindowAdapter) {
        if let Some(agent) = self.state.lock().agent.take() {
            adapter.release_object(&agent);
            debug!("dropped {:?} agent", self.kind);
        }
    }
}
