//! wmlink - split-process window management control plane
//!
//! Client processes hold `WindowImpl` handles and a process-wide
//! `WindowManager`; the service keeps the authoritative window state and
//! pushes changes back. Both sides speak the `wmlink-ipc` interfaces, either
//! in-process or over the Unix socket hosted by `server::ServiceHost`.

pub mod client;
pub mod config;
mod link;
pub mod server;
pub mod service;

#[cfg(test)]
mod testing;
