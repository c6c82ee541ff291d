// Shared utilities module
pub mod errors;
pub mod logging;
pub mod ui;
pub mod cache;
pub mod source_maps;
pub mod config_loader;
pub mod watch;

pub use errors::*;
pub use logging::*;
pub use ui::*;
pub use config_loader::*;
pub use watch::*;
