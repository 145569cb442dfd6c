pub mod app;
pub mod assets;
pub mod audio;
pub mod background;
pub mod bootstrap;
pub mod camera3d;
pub mod capability;
pub mod cli;
pub mod color;
pub mod config;
pub mod controls;
pub mod drag;
pub mod error;
pub mod events;
pub mod headless;
pub mod host;
pub mod lifecycle;
pub mod listeners;
pub mod platform;
pub mod render_loop;
pub mod scene;
pub mod scenes;
pub mod session;
pub mod xr;

pub use app::{run, run_with_overrides, RunSummary};
pub use host::{HostCommands, HostContext};
pub use lifecycle::SceneHost;
