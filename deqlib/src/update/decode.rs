//! The decode side: SysEx stream or raw dump in, sparse flash out.

use std::collections::BTreeMap;

use crate::profile::{self, DeviceProfile};
use crate::protocol::{
    block_cipher, is_sysex, obfuscation, seven_bit, EventIter, SysExEvent, CMD_WRITE_FLASH,
};
use crate::Error;

use super::{
    FirmwareBundle, FlashBlock, Format, BLOCK_COUNT, BLOCK_LEN, DISPLAY_SUB, SUBS_PER_BLOCK,
    SUB_HEADER_LEN, SUB_TOTAL_LEN,
};

/// Decode a firmware file of either format into a [FirmwareBundle].
pub fn decode(data: &[u8]) -> Result<FirmwareBundle, Error> {
    if is_sysex(data) {
        decode_sysex(data)
    } else {
        decode_raw(data)
    }
}

/// Decode a SysEx update stream.
pub fn decode_sysex(data: &[u8]) -> Result<FirmwareBundle, Error> {
    let mut decoder = UpdateDecoder::new();
    for event in EventIter::new(data) {
        match decoder.feed(&event) {
            Ok(()) => {}
            Err(Error::UnknownCommand(cmd)) => {
                log::warn!("skipping event with unrecognized command {:#04x}", cmd);
            }
            Err(e) => return Err(e),
        }
    }
    decoder.finish()
}

fn decode_raw(data: &[u8]) -> Result<FirmwareBundle, Error> {
    if data.is_empty() || data.len() > BLOCK_COUNT * BLOCK_LEN {
        return Err(Error::BadLength(data.len()));
    }

    let mut blocks = BTreeMap::new();
    for (i, chunk) in data.chunks(BLOCK_LEN).enumerate() {
        let mut buf = chunk.to_vec();
        // a dump cut short mid-block reads as erased flash past the end
        buf.resize(BLOCK_LEN, 0xFF);
        blocks.insert(i as u8, FlashBlock::new(i as u8, buf)?);
    }

    Ok(FirmwareBundle {
        profile: profile::identify_image(&blocks),
        blocks,
        format: Format::Raw,
        messages: BTreeMap::new(),
        model_id: None,
    })
}

/// Streaming assembler for update events.
///
/// Sub-blocks may arrive in any order; a flash block materializes in
/// [UpdateDecoder::finish] once all sixteen of its sub-blocks are in.
/// Not for sharing across threads while feeding.
#[derive(Debug, Clone, Default)]
pub struct UpdateDecoder {
    profile: Option<&'static DeviceProfile>,
    subs: BTreeMap<u16, Vec<u8>>,
    messages: BTreeMap<usize, String>,
    accepted: usize,
    model_id: Option<u8>,
}

impl UpdateDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one parsed event.
    ///
    /// [Error::UnknownCommand] is advisory: the caller decides whether
    /// to skip the event or give up. Everything else is fatal to the
    /// decode.
    pub fn feed(&mut self, event: &SysExEvent<&[u8]>) -> Result<(), Error> {
        if event.command != CMD_WRITE_FLASH {
            return Err(Error::UnknownCommand(event.command));
        }

        let unpacked = seven_bit::unpack(event.payload)?;
        if unpacked.len() < SUB_TOTAL_LEN {
            return Err(Error::BadLength(unpacked.len()));
        }

        if self.model_id.is_none() {
            self.model_id = Some(event.model_id);
        }

        // the first firmware event decides the device family
        let profile = match self.profile {
            Some(p) => p,
            None => {
                let p = profile::identify_update(&unpacked, event.model_id)?;
                log::debug!("identified update stream as {}", p.name);
                self.profile = Some(p);
                p
            }
        };

        let mut sub = unpacked;
        sub.truncate(SUB_TOTAL_LEN);
        obfuscation::apply(profile.midi_key, &mut sub);

        let number = ((sub[0] as u16) << 8) | sub[1] as u16;
        let provided = sub[2];
        let data = &sub[SUB_HEADER_LEN..];

        if number == DISPLAY_SUB {
            let text = data.split(|b| *b == 0).next().unwrap_or(data);
            self.messages.insert(
                self.accepted,
                String::from_utf8_lossy(text).into_owned(),
            );
            return Ok(());
        }

        let calculated = profile.checksum.sum(data);
        if calculated != provided {
            return Err(Error::ChecksumMismatch {
                sub: number,
                calculated,
                provided,
            });
        }

        self.subs.insert(number, data.to_vec());
        self.accepted += 1;
        Ok(())
    }

    /// Finalize: assemble every block whose sixteen sub-blocks are all
    /// present, deciphering the ones inside the profile's covered
    /// range. Incomplete blocks are left out, never zero-filled.
    pub fn finish(self) -> Result<FirmwareBundle, Error> {
        let mut blocks = BTreeMap::new();

        if let Some(profile) = self.profile {
            for index in 0..BLOCK_COUNT as u16 {
                let subs: Vec<_> = (0..SUBS_PER_BLOCK as u16)
                    .map(|j| self.subs.get(&((index << 4) | j)))
                    .collect();
                if subs.iter().any(|s| s.is_none()) {
                    continue;
                }

                let mut buf = Vec::with_capacity(BLOCK_LEN);
                for sub in subs.into_iter().flatten() {
                    buf.extend_from_slice(sub);
                }

                if profile.crypted(index as u8) {
                    block_cipher::apply(&mut buf, index);
                }

                blocks.insert(index as u8, FlashBlock::new(index as u8, buf)?);
            }
        }

        Ok(FirmwareBundle {
            profile: self.profile,
            blocks,
            format: Format::SysEx,
            messages: self.messages,
            model_id: self.model_id,
        })
    }
}
