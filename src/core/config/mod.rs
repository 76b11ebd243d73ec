pub mod data;
pub mod defaults;
pub mod io;
pub mod orchestrator;
pub mod printing;

pub use data::{path_display, Config, DEFAULT_MAX_TOOL_HOPS};
pub use io::ConfigError;
