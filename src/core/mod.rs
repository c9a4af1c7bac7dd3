// Core module - Connection engine
pub mod buffer;
pub mod escape;
pub mod hex;
pub mod mapping;
pub mod session;
pub mod settings;

pub use self::buffer::WriteBuffer;
pub use self::escape::{decode, Command, Decision, ESCAPE_KEY};
pub use self::hex::HexAccumulator;
pub use self::mapping::MappingConfig;
pub use self::session::{DeviceControl, ModemLine, ModemLines, Session, SessionEvent, Statistics};
pub use self::settings::DeviceSettings;
