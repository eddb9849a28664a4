pub const SYSEX_START: u8 = 0xF0;
pub const SYSEX_END: u8 = 0xF7;

/// Vendor identifier carried by every event we understand.
pub const VENDOR: [u8; 3] = [0x00, 0x20, 0x32];

/// Device ID addressing every unit on the bus.
pub const DEVICE_BROADCAST: u8 = 0x7F;

/// Command carrying one flash sub-block of an update.
pub const CMD_WRITE_FLASH: u8 = 0x34;

pub mod checksum;

pub mod obfuscation;

pub mod seven_bit;

pub mod block_cipher;

mod event;
pub use event::{is_sysex, SysExEvent};

pub mod parse;
pub use parse::EventIter;

pub mod serialize;
pub use serialize::Serializer;
