/// Errors produced while decoding or building update streams.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed SysEx envelope: {0}")]
    MalformedEnvelope(&'static str),

    #[error("bad coded length: {0} bytes")]
    BadLength(usize),

    #[error(
        "sub-block {sub:#06x} checksum mismatch: calculated {calculated:#04x}, stream has {provided:#04x}"
    )]
    ChecksumMismatch {
        sub: u16,
        calculated: u8,
        provided: u8,
    },

    #[error("unrecognized command {0:#04x}")]
    UnknownCommand(u8),

    #[error("update stream matches more than one device profile")]
    AmbiguousProfile,

    #[error("update stream matches no known device profile")]
    UnknownProfile,

    #[error("no device profile for {0:?}")]
    UnsupportedDevice(String),

    #[error("sub-block payload must be {expected} bytes, got {actual}")]
    ShortBlock { expected: usize, actual: usize },

    #[error("flash address {0:#x} is not aligned to a 4 KiB block")]
    UnalignedAddress(u32),
}
