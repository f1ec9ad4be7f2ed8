#![forbid(unsafe_code)]
//! Fire Lamp settings core
//!
//! Crash-safe persistence of the lamp's settings and effect records, debounced
//! saving, and busy-gated handling of commands from the button, the web UI and
//! the pub/sub transport. Everything runs on one loop; see [`Lamp`].

pub mod button;
pub mod command;
pub mod config;
pub mod constants;
pub mod effects;
pub mod lamp;
pub mod mqtt;
pub mod persistence;
pub mod platform;
pub mod queue;
pub mod scheduler;
pub mod tasks;

pub use button::ButtonGesture;
pub use config::ConfigStore;
pub use effects::builtin_effects;
pub use lamp::{Lamp, LampOptions, LampStats, StartupError, Submission};
pub use persistence::{DirStorage, Storage};
pub use platform::{HostPlatform, Platform};
pub use queue::CommandOrigin;
