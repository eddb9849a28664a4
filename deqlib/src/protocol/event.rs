use crate::Error;

use super::serialize::{Serializer, SerializerVec};
use super::{DEVICE_BROADCAST, SYSEX_END, SYSEX_START, VENDOR};

/// One System Exclusive event, header split out, payload still coded.
///
/// `I` is any byte container: parsing borrows from the input buffer,
/// building owns its payload.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SysExEvent<I> {
    /// Unit address on the bus, or [DEVICE_BROADCAST].
    pub device_id: u8,
    pub model_id: u8,
    pub command: u8,
    pub payload: I,
}

impl<'a> SysExEvent<&'a [u8]> {
    /// Parse an event body, the bytes between the start and end
    /// sentinels. The vendor tag is required; anything else is some
    /// other manufacturer's traffic.
    pub fn parse(body: &'a [u8]) -> Result<Self, Error> {
        let (payload, (device_id, model_id, command)) = nom::sequence::preceded(
            nom::bytes::complete::tag(&VENDOR[..]),
            nom::sequence::tuple((
                nom::number::complete::u8,
                nom::number::complete::u8,
                nom::number::complete::u8,
            )),
        )(body)
        .map_err(|_: nom::Err<nom::error::Error<&[u8]>>| {
            Error::MalformedEnvelope("missing vendor tag or header")
        })?;

        Ok(SysExEvent {
            device_id,
            model_id,
            command,
            payload,
        })
    }

    pub fn to_owned(&self) -> SysExEvent<Vec<u8>> {
        SysExEvent {
            device_id: self.device_id,
            model_id: self.model_id,
            command: self.command,
            payload: self.payload.to_vec(),
        }
    }
}

impl<I> SysExEvent<I>
where
    I: AsRef<[u8]>,
{
    /// A broadcast event, the usual shape for update traffic.
    pub fn broadcast(model_id: u8, command: u8, payload: I) -> Self {
        Self {
            device_id: DEVICE_BROADCAST,
            model_id,
            command,
            payload,
        }
    }

    /// Write the framed event: sentinels, vendor tag, header, payload.
    ///
    /// The payload must already be 7-bit clean; the coder in
    /// [super::seven_bit] guarantees that.
    pub fn serialize<S>(&self, ser: &mut S) -> Result<(), S::Error>
    where
        S: Serializer,
    {
        let payload = self.payload.as_ref();
        debug_assert!(payload.iter().all(|b| b & 0x80 == 0));

        ser.write_u8(SYSEX_START)?;
        ser.write_bytes(&VENDOR)?;
        ser.write_u8(self.device_id)?;
        ser.write_u8(self.model_id)?;
        ser.write_u8(self.command)?;
        ser.write_bytes(payload)?;
        ser.write_u8(SYSEX_END)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        let mut ser = SerializerVec::new();
        match self.serialize(&mut ser) {
            Ok(()) => ser.done(),
            Err(never) => match never {},
        }
    }
}

/// Decide whether a whole buffer is a SysEx stream rather than a raw
/// flash image: starts and ends on the sentinels, and nothing in
/// between carries a high bit except status bytes.
pub fn is_sysex(data: &[u8]) -> bool {
    if data.len() < 2 {
        return false;
    }
    if data[0] != SYSEX_START || data[data.len() - 1] != SYSEX_END {
        return false;
    }

    data[1..data.len() - 1]
        .iter()
        .all(|b| b & 0x80 == 0 || *b >= 0xF0)
}
