//! The 7/8 transport codec.
//!
//! MIDI payload bytes must keep their high bit clear, so seven data
//! bytes travel as eight: the seven low-bit-stripped bytes first, then
//! one byte collecting the stripped high bits.

use crate::Error;

/// Input bytes per coded group.
pub const GROUP_RAW: usize = 7;
/// Output bytes per coded group.
pub const GROUP_CODED: usize = 8;

/// Code a byte sequence into a 7-bit-clean sequence.
///
/// Any input length is accepted; a short final group is padded with
/// zero bytes. The output is always `8 * ceil(len / 7)` bytes.
pub fn pack(data: &[u8]) -> Vec<u8> {
    let groups = (data.len() + GROUP_RAW - 1) / GROUP_RAW;
    let mut out = Vec::with_capacity(groups * GROUP_CODED);

    for group in data.chunks(GROUP_RAW) {
        // high bits land in one trailing byte, first input highest
        let mut high = 0u8;
        for (i, b) in group.iter().enumerate() {
            out.push(b & 0x7F);
            high |= (b >> 7) << (6 - i);
        }
        for _ in group.len()..GROUP_RAW {
            out.push(0);
        }
        out.push(high);
    }

    out
}

/// Restore a byte sequence coded by [pack].
///
/// The input must be a whole number of eight-byte groups. Zero padding
/// added by [pack] for a short final group is not trimmed here.
pub fn unpack(data: &[u8]) -> Result<Vec<u8>, Error> {
    if data.len() % GROUP_CODED != 0 {
        return Err(Error::BadLength(data.len()));
    }

    let mut out = Vec::with_capacity(data.len() / GROUP_CODED * GROUP_RAW);
    for group in data.chunks_exact(GROUP_CODED) {
        let high = group[GROUP_RAW];
        for (i, p) in group[..GROUP_RAW].iter().enumerate() {
            out.push(p | ((high << (i + 1)) & 0x80));
        }
    }

    Ok(out)
}
