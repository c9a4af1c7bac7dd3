// Infrastructure module - Device, socket and filesystem adapters
pub mod config;
pub mod device;
pub mod discovery;
pub mod log;
pub mod logging;
pub mod socket;

pub use self::config::ConfigManager;
pub use self::device::Connection;
pub use self::log::SessionLog;
pub use self::socket::SocketBridge;
