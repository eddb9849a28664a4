//! Assembling flash content out of update streams, and back.

use std::collections::BTreeMap;

use crate::profile::DeviceProfile;
use crate::Error;

mod decode;
pub use decode::{decode, decode_sysex, UpdateDecoder};

mod encode;
pub use encode::{encode, encode_events};

/// Bytes in one flash block.
pub const BLOCK_LEN: usize = 0x1000;

/// Blocks on the chip.
pub const BLOCK_COUNT: usize = 0x80;

/// Data bytes in one transport sub-block.
pub const SUB_DATA_LEN: usize = 0x100;

/// Sub-block header: number (big-endian) and checksum.
pub const SUB_HEADER_LEN: usize = 3;

/// A whole sub-block as transported, header plus data.
pub const SUB_TOTAL_LEN: usize = SUB_HEADER_LEN + SUB_DATA_LEN;

/// Sub-blocks per flash block.
pub const SUBS_PER_BLOCK: usize = 16;

/// Sub-block number reserved for LCD text instead of flash data.
pub const DISPLAY_SUB: u16 = 0xFF00;

/// One 4 KiB unit of flash content, tagged with its block number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FlashBlock {
    index: u8,
    data: Vec<u8>,
}

impl FlashBlock {
    pub fn new(index: u8, data: Vec<u8>) -> Result<Self, Error> {
        if data.len() != BLOCK_LEN {
            return Err(Error::ShortBlock {
                expected: BLOCK_LEN,
                actual: data.len(),
            });
        }
        Ok(Self { index, data })
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    /// Flash byte address of this block.
    pub fn address(&self) -> u32 {
        (self.index as u32) << 12
    }
}

impl std::ops::Deref for FlashBlock {
    type Target = [u8];
    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

/// Where a decoded image came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Format {
    /// A plain flash dump.
    Raw,
    /// A SysEx update stream.
    SysEx,
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Raw => write!(f, "raw-binary"),
            Self::SysEx => write!(f, "sysex"),
        }
    }
}

/// Everything recovered from one decode pass. Read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareBundle {
    /// The identified device family, when one could be identified.
    pub profile: Option<&'static DeviceProfile>,
    /// Flash content, sparse: a missing block was not touched by this
    /// update.
    pub blocks: BTreeMap<u8, FlashBlock>,
    pub format: Format,
    /// LCD text, keyed by how many firmware sub-blocks preceded it.
    pub messages: BTreeMap<usize, String>,
    /// Model ID observed on the wire, for SysEx input.
    pub model_id: Option<u8>,
}
