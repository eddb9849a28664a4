//! The encode side: cleartext flash data out to a SysEx update stream.

use std::collections::BTreeMap;

use crate::profile::DeviceProfile;
use crate::protocol::{block_cipher, obfuscation, seven_bit, SysExEvent, CMD_WRITE_FLASH};
use crate::Error;

use super::{BLOCK_COUNT, BLOCK_LEN, DISPLAY_SUB, SUBS_PER_BLOCK, SUB_DATA_LEN};

/// Build the update stream for `data` landing at `address`, as one
/// contiguous byte buffer.
///
/// `messages` queues LCD text by sub-block ordinal; an entry at the
/// ordinal one past the last sub-block goes out after all flash data.
pub fn encode(
    profile: &DeviceProfile,
    address: u32,
    data: &[u8],
    messages: &BTreeMap<usize, String>,
) -> Result<Vec<u8>, Error> {
    Ok(encode_events(profile, address, data, messages)?.concat())
}

/// Like [encode], but one buffer per SysEx event, for callers that
/// feed events to a port or interleave their own traffic.
pub fn encode_events(
    profile: &DeviceProfile,
    address: u32,
    data: &[u8],
    messages: &BTreeMap<usize, String>,
) -> Result<Vec<Vec<u8>>, Error> {
    if address as usize % BLOCK_LEN != 0 {
        return Err(Error::UnalignedAddress(address));
    }

    let base = (address as usize) / BLOCK_LEN;
    let block_count = (data.len() + BLOCK_LEN - 1) / BLOCK_LEN;
    if base + block_count > BLOCK_COUNT {
        return Err(Error::BadLength(data.len()));
    }

    let mut work = data.to_vec();
    if address == profile.app_address() {
        // application images live XORed on the chip
        obfuscation::apply(&profile.app_key[..], &mut work);
    }
    work.resize(block_count * BLOCK_LEN, 0xFF);

    let mut events = Vec::with_capacity(block_count * SUBS_PER_BLOCK);
    let mut ordinal = 0usize;

    for (i, block) in work.chunks_exact_mut(BLOCK_LEN).enumerate() {
        let index = (base + i) as u16;
        if profile.crypted(index as u8) {
            block_cipher::apply(block, index);
        }

        for (j, payload) in block.chunks_exact(SUB_DATA_LEN).enumerate() {
            if let Some(text) = messages.get(&ordinal) {
                events.push(display_event(profile, text));
            }
            events.push(sub_block_event(
                profile,
                (index << 4) | j as u16,
                payload,
            )?);
            ordinal += 1;
        }
    }

    if let Some(text) = messages.get(&ordinal) {
        events.push(display_event(profile, text));
    }

    Ok(events)
}

/// Wrap one sub-block: header, transport key, 7/8 code, envelope.
fn sub_block_event(profile: &DeviceProfile, sub: u16, payload: &[u8]) -> Result<Vec<u8>, Error> {
    if payload.len() != SUB_DATA_LEN {
        return Err(Error::ShortBlock {
            expected: SUB_DATA_LEN,
            actual: payload.len(),
        });
    }

    let mut raw = vec![(sub >> 8) as u8, (sub & 0xFF) as u8, profile.checksum.sum(payload)];
    raw.extend_from_slice(payload);
    obfuscation::apply(profile.midi_key, &mut raw);

    let event = SysExEvent::broadcast(profile.model_id, CMD_WRITE_FLASH, seven_bit::pack(&raw));
    Ok(event.to_vec())
}

fn display_event(profile: &DeviceProfile, text: &str) -> Vec<u8> {
    let mut payload = text.as_bytes().to_vec();
    payload.truncate(SUB_DATA_LEN);
    payload.resize(SUB_DATA_LEN, 0);

    // the payload is always full-size here, so this cannot fail
    match sub_block_event(profile, DISPLAY_SUB, &payload) {
        Ok(event) => event,
        Err(_) => unreachable!(),
    }
}
