//! Scanner that pulls well-formed events out of a raw byte stream.
//!
//! Update files ripped from a bus log can carry anything between
//! events: other manufacturers' traffic, truncated events, stray
//! status bytes. The scanner walks the buffer once, keeps what parses,
//! and logs what it skips.

use super::event::SysExEvent;
use super::{SYSEX_END, SYSEX_START};

/// Iterator over the well-formed, vendor-matching events in a buffer.
///
/// An event starts at a `0xF0` and runs to the next byte with the high
/// bit set. Only a `0xF7` terminator makes it well-formed; any other
/// status byte abandons the event and the scan resumes at that byte,
/// which may itself start the next event.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> EventIter<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }
}

impl<'a> Iterator for EventIter<'a> {
    type Item = SysExEvent<&'a [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            // searching: find the next start sentinel
            let start = self.pos
                + self.data[self.pos..]
                    .iter()
                    .position(|b| *b == SYSEX_START)?;

            // in-event: accumulate until a status byte
            let body_start = start + 1;
            let Some(term) = self.data[body_start..]
                .iter()
                .position(|b| b & 0x80 != 0)
                .map(|i| body_start + i)
            else {
                // ran off the end mid-event
                log::debug!("dropping truncated event at offset {:#x}", start);
                self.pos = self.data.len();
                return None;
            };

            // finalize: only the end sentinel closes an event
            if self.data[term] != SYSEX_END {
                log::debug!(
                    "skipping event at offset {:#x}: interrupted by status byte {:#04x}",
                    start,
                    self.data[term]
                );
                self.pos = term;
                continue;
            }

            self.pos = term + 1;
            match SysExEvent::parse(&self.data[body_start..term]) {
                Ok(event) => return Some(event),
                Err(e) => {
                    log::debug!("skipping event at offset {:#x}: {}", start, e);
                    continue;
                }
            }
        }
    }
}
