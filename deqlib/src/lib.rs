//! Codec for DEQ2496-family firmware carried over MIDI System
//! Exclusive.
//!
//! The decode path takes a byte buffer (a bus capture, an update file,
//! or a raw flash dump), peels the envelope, transport coding, and
//! cipher layers, and yields a sparse map of flash blocks plus any LCD
//! text the update would show. The encode path mirrors it. Everything
//! is in-memory and deterministic; ports and files belong to the
//! caller.

pub mod image;
pub mod profile;
pub mod protocol;
pub mod update;

mod error;
pub use error::Error;

pub use update::{decode, encode, FirmwareBundle, FlashBlock, Format};
