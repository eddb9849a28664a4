//! Per-device-family constants and identification.
//!
//! Everything that distinguishes one family member from another lives
//! in a [DeviceProfile]: the transport and application XOR keys, the
//! checksum constants, which blocks the address cipher covers, the
//! flash layout, and the byte signatures used to recognize an image.

use std::collections::BTreeMap;

use crate::protocol::checksum::{self, Checksum};
use crate::protocol::obfuscation;
use crate::update::{FlashBlock, BLOCK_LEN, SUB_DATA_LEN, SUB_HEADER_LEN, SUB_TOTAL_LEN};
use crate::Error;

/// Length of an application XOR key, trailing NUL included.
pub const APP_KEY_LEN: usize = 56;

/// Length of the banner and model tag strings in the bootloader.
pub const TAG_LEN: usize = 25;

/// A named range of flash blocks, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Region {
    pub name: &'static str,
    pub first: u8,
    pub last: u8,
}

impl Region {
    pub fn contains(&self, block: u8) -> bool {
        self.first <= block && block <= self.last
    }

    /// Flash byte address of the first block.
    pub fn address(&self) -> u32 {
        (self.first as u32) << 12
    }

    pub fn blocks(&self) -> impl Iterator<Item = u8> {
        self.first..=self.last
    }
}

/// A byte-string probe at a fixed position in flash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Signature {
    pub block: u8,
    pub offset: usize,
    pub magic: &'static [u8],
}

impl Signature {
    pub fn matches(&self, blocks: &BTreeMap<u8, FlashBlock>) -> bool {
        let Some(block) = blocks.get(&self.block) else {
            return false;
        };
        let end = self.offset + self.magic.len();
        end <= BLOCK_LEN && &block[self.offset..end] == self.magic
    }
}

/// Where the bootloader keeps its copies of the device keys.
///
/// All offsets are absolute flash addresses inside the bootloader
/// region. The application key is stored XORed with the bootloader
/// key, so the two together reveal it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BootOffsets {
    /// 56-byte bootloader key.
    pub boot_key: usize,
    /// 56-byte application key, XORed with the bootloader key.
    pub crypt_app_key: usize,
    /// 5-byte transport key.
    pub midi_key: usize,
    /// 25-byte LCD banner.
    pub banner: usize,
    /// 25-byte model tag.
    pub model_tag: usize,
}

/// Constants for one device family.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceProfile {
    pub name: &'static str,
    pub model_id: u8,
    /// Transport XOR key applied to every sub-block.
    pub midi_key: &'static [u8],
    /// Application XOR key. The trailing NUL is part of the key.
    pub app_key: &'static [u8; APP_KEY_LEN],
    pub checksum: Checksum,
    /// First and last block covered by the address cipher.
    pub crypt_first: u8,
    pub crypt_last: u8,
    /// First block of the application region.
    pub app_first: u8,
    pub layout: &'static [Region],
    /// Matched against flash content to recognize this family.
    pub signature: Signature,
    /// Matched against a decrypted application image, when known.
    pub app_signature: Option<Signature>,
    /// Known key locations in the bootloader, when known.
    pub boot_offsets: Option<BootOffsets>,
}

impl DeviceProfile {
    /// Does the address cipher apply to this block?
    pub fn crypted(&self, block: u8) -> bool {
        self.crypt_first <= block && block <= self.crypt_last
    }

    /// Flash byte address of the application region.
    pub fn app_address(&self) -> u32 {
        (self.app_first as u32) << 12
    }

    pub fn region(&self, name: &str) -> Option<&'static Region> {
        self.layout.iter().find(|r| r.name == name)
    }
}

const LAYOUT_V2: &[Region] = &[
    Region {
        name: "bootloader",
        first: 0x00,
        last: 0x03,
    },
    Region {
        name: "application",
        first: 0x04,
        last: 0x5A,
    },
    Region {
        name: "unused",
        first: 0x5B,
        last: 0x73,
    },
    Region {
        name: "presets",
        first: 0x74,
        last: 0x7B,
    },
    Region {
        name: "scratch",
        first: 0x7C,
        last: 0x7D,
    },
    Region {
        name: "devicedata",
        first: 0x7E,
        last: 0x7F,
    },
];

const LAYOUT_V1: &[Region] = &[
    Region {
        name: "bootloader",
        first: 0x00,
        last: 0x01,
    },
    Region {
        name: "application",
        first: 0x02,
        last: 0x5E,
    },
    Region {
        name: "unused",
        first: 0x5F,
        last: 0x73,
    },
    Region {
        name: "presets",
        first: 0x74,
        last: 0x7B,
    },
    Region {
        name: "scratch",
        first: 0x7C,
        last: 0x7D,
    },
    Region {
        name: "devicedata",
        first: 0x7E,
        last: 0x7F,
    },
];

/// The known device families, in trial order.
pub const PROFILES: &[DeviceProfile] = &[
    DeviceProfile {
        name: "deq2496v2",
        model_id: 0x12,
        midi_key: b"TZ'04",
        app_key: b"- ORIGINAL BEHRINGER CODE - COPYRIGHT 2004 - BGER/TZ - \0",
        checksum: checksum::DEQ,
        crypt_first: 0x04,
        crypt_last: 0x5A,
        app_first: 0x04,
        layout: LAYOUT_V2,
        signature: Signature {
            block: 0x02,
            offset: 0xC94,
            magic: b"DEQ2496V2 BOOTLOADER V2.2",
        },
        app_signature: Some(Signature {
            block: 0x04,
            offset: 0x01C,
            magic: b"COPY",
        }),
        boot_offsets: Some(BootOffsets {
            boot_key: 0x3002,
            crypt_app_key: 0x303A,
            midi_key: 0x2C84,
            banner: 0x308A,
            model_tag: 0x2C94,
        }),
    },
    DeviceProfile {
        name: "deq2496v1",
        model_id: 0x12,
        midi_key: b"TZ'02",
        app_key: b"- ORIGINAL BEHRINGER CODE - COPYRIGHT 2002 - BGER/TZ - \0",
        checksum: checksum::DEQ,
        crypt_first: 0x02,
        crypt_last: 0x5E,
        app_first: 0x02,
        layout: LAYOUT_V1,
        signature: Signature {
            block: 0x02,
            offset: 0x020,
            magic: b"SIG",
        },
        app_signature: None,
        boot_offsets: None,
    },
];

/// Look a profile up by its registry name.
pub fn find(name: &str) -> Result<&'static DeviceProfile, Error> {
    PROFILES
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| Error::UnsupportedDevice(name.to_owned()))
}

/// Identify the sending device from the first firmware sub-block of an
/// update stream.
///
/// `unpacked` is the 7/8-decoded payload, still under the transport
/// key. Each profile's key is tried in registry order and the first
/// whose checksum verifies wins. When none verifies, fall back to the
/// model ID observed on the wire, which must pick exactly one profile.
pub fn identify_update(unpacked: &[u8], model_id: u8) -> Result<&'static DeviceProfile, Error> {
    if unpacked.len() < SUB_TOTAL_LEN {
        return Err(Error::BadLength(unpacked.len()));
    }

    for profile in PROFILES {
        let mut sub = unpacked[..SUB_TOTAL_LEN].to_vec();
        obfuscation::apply(profile.midi_key, &mut sub);

        let provided = sub[2];
        let data = &sub[SUB_HEADER_LEN..SUB_HEADER_LEN + SUB_DATA_LEN];
        if profile.checksum.sum(data) == provided {
            return Ok(profile);
        }
    }

    let mut by_model = PROFILES.iter().filter(|p| p.model_id == model_id);
    match (by_model.next(), by_model.next()) {
        (Some(profile), None) => Ok(profile),
        (Some(_), Some(_)) => Err(Error::AmbiguousProfile),
        (None, _) => Err(Error::UnknownProfile),
    }
}

/// Identify a device family from flash content by its signatures.
pub fn identify_image(blocks: &BTreeMap<u8, FlashBlock>) -> Option<&'static DeviceProfile> {
    PROFILES.iter().find(|p| {
        p.signature.matches(blocks)
            || p.app_signature
                .as_ref()
                .map_or(false, |sig| sig.matches(blocks))
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::protocol::seven_bit;

    fn sub_block(profile: &DeviceProfile, sub: u16, data: &[u8; SUB_DATA_LEN]) -> Vec<u8> {
        let mut raw = vec![(sub >> 8) as u8, (sub & 0xFF) as u8];
        raw.push(profile.checksum.sum(data));
        raw.extend_from_slice(data);
        obfuscation::apply(profile.midi_key, &mut raw);
        raw
    }

    #[test]
    fn layouts_tile_the_chip() {
        for profile in PROFILES {
            let mut next = 0x00u16;
            for region in profile.layout {
                assert_eq!(region.first as u16, next, "{}", profile.name);
                assert!(region.first <= region.last);
                next = region.last as u16 + 1;
            }
            assert_eq!(next, 0x80);
        }
    }

    #[test]
    fn app_keys_end_in_nul() {
        for profile in PROFILES {
            assert_eq!(profile.app_key[APP_KEY_LEN - 1], 0, "{}", profile.name);
        }
    }

    #[test]
    fn identify_by_transport_key() {
        let profile = &PROFILES[0];
        let sub = sub_block(profile, 0x0040, &[0x5A; SUB_DATA_LEN]);
        let found = identify_update(&sub, profile.model_id).unwrap();
        assert_eq!(found.name, profile.name);
    }

    #[test]
    fn first_matching_profile_wins() {
        // the two transport keys differ by a pattern the checksum
        // cannot see, so both trials pass and registry order decides
        let sub = sub_block(&PROFILES[1], 0x0040, &[0x5A; SUB_DATA_LEN]);
        let found = identify_update(&sub, PROFILES[1].model_id).unwrap();
        assert_eq!(found.name, PROFILES[0].name);
    }

    #[test]
    fn identify_ignores_trailing_padding() {
        let profile = &PROFILES[0];
        let sub = sub_block(profile, 0x0040, &[0x11; SUB_DATA_LEN]);
        let mut unpacked = seven_bit::unpack(&seven_bit::pack(&sub)).unwrap();
        assert_eq!(unpacked.len(), SUB_TOTAL_LEN);
        unpacked.extend_from_slice(&[0; 7]);
        let found = identify_update(&unpacked, profile.model_id).unwrap();
        assert_eq!(found.name, profile.name);
    }

    #[test]
    fn identify_falls_back_on_model_id() {
        // garbage passes no checksum; both profiles share the model id
        let garbage = vec![0x13; SUB_TOTAL_LEN];
        assert!(matches!(
            identify_update(&garbage, PROFILES[0].model_id),
            Err(Error::AmbiguousProfile)
        ));
        assert!(matches!(
            identify_update(&garbage, 0x55),
            Err(Error::UnknownProfile)
        ));
    }

    #[test]
    fn find_is_case_insensitive() {
        assert_eq!(find("DEQ2496V2").unwrap().name, "deq2496v2");
        assert!(matches!(
            find("deq9999"),
            Err(Error::UnsupportedDevice(_))
        ));
    }
}
