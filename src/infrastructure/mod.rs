// Infrastructure layer
pub mod file_system;
pub mod processors;
pub mod notifier;
pub mod live_reload;
pub mod live_reload_client;
pub mod dev_server;

pub use file_system::*;
pub use processors::*;
pub use notifier::*;
pub use live_reload::*;
pub use live_reload_client::*;
pub use dev_server::*;
