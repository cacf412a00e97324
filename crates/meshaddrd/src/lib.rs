//! Reference host daemon for the meshaddr address core.
//!
//! Loads a TOML configuration, brings interfaces up with hooks that log
//! MLD and Neighbor Solicitation traffic, and drives the fast and slow
//! ticks from a tokio event loop.

pub mod daemon;
pub mod hooks;
pub mod observer;

pub use daemon::{Daemon, TickStats};
pub use hooks::logging_hooks;
pub use observer::LoggingObserver;
