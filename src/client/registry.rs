//! Process-wide table of created windows, keyed by name.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use wmlink_ipc::types::WindowType;

use super::window::{WindowDestroyListener, WindowImpl};

struct Entry {
    window_id: u32,
    parent_id: u32,
    window_type: WindowType,
    window: Weak<WindowImpl>,
}

#[derive(Default)]
pub struct WindowRegistry {
    windows: Mutex<HashMap<String, Entry>>,
    death_listener: Mutex<Option<Arc<dyn WindowDestroyListener>>>,
}

impl WindowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.windows.lock().contains_key(name)
    }

    pub fn contains_id(&self, window_id: u32) -> bool {
        self.windows
            .lock()
            .values()
            .any(|entry| entry.window_id == window_id)
    }

    pub fn has_window_of_type(&self, window_type: WindowType) -> bool {
        self.windows
            .lock()
            .values()
            .any(|entry| entry.window_type == window_type)
    }

    pub(crate) fn insert(&self, name: &str, window_id: u32, parent_id: u32, window: &Arc<WindowImpl>) {
        let entry = Entry {
            window_id,
            parent_id,
            window_type: window.window_type(),
            window: Arc::downgrade(window),
        };
        self.windows.lock().insert(name.to_string(), entry);
    }

    /// Remove `name` if it still maps to `window_id`.
    pub(crate) fn remove(&self, name: &str, window_id: u32) -> bool {
        let mut windows = self.windows.lock();
        if windows.get(name).is_some_and(|entry| entry.window_id == window_id) {
            windows.remove(name);
            return true;
        }
        false
    }

    pub fn find_by_name(&self, name: &str) -> Option<Arc<WindowImpl>> {
        self.windows.lock().get(name)?.window.upgrade()
    }

    pub fn find_by_id(&self, window_id: u32) -> Option<Arc<WindowImpl>> {
        self.windows
            .lock()
            .values()
            .find(|entry| entry.window_id == window_id)?
            .window
            .upgrade()
    }

    pub fn children_of(&self, parent_id: u32) -> Vec<Arc<WindowImpl>> {
        self.windows
            .lock()
            .values()
            .filter(|entry| entry.parent_id == parent_id)
            .filter_map(|entry| entry.window.upgrade())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.windows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.lock().is_empty()
    }

    /// Listener told about every window of this process before it is destroyed.
    pub fn set_death_listener(&self, listener: Option<Arc<dyn WindowDestroyListener>>) {
        *self.death_listener.lock() = listener;
    }

    pub(crate) fn death_listener(&self) -> Option<Arc<dyn WindowDestroyListener>> {
        self.death_listener.lock().clone()
    }
}
