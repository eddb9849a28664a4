//! Carving a decoded bundle into the named logical images.

use crate::profile::{Region, APP_KEY_LEN, TAG_LEN};
use crate::protocol::obfuscation;
use crate::update::{FirmwareBundle, BLOCK_COUNT, BLOCK_LEN};

/// How to render blocks missing from a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Gap {
    /// Stop at the first gap after data has started. Leading gaps
    /// shift the start instead. This is what the device would actually
    /// write.
    Stop,
    /// Substitute erased flash. This is the full-chip view.
    Fill,
}

/// One logical image cut out of the flash map.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NamedImage {
    pub name: String,
    /// Flash byte address of the first byte.
    pub address: u32,
    pub data: Vec<u8>,
}

/// Render one region of the bundle. Returns None when the region has
/// no blocks at all under [Gap::Stop].
pub fn region_image(bundle: &FirmwareBundle, region: &Region, gap: Gap) -> Option<NamedImage> {
    match gap {
        Gap::Stop => {
            let first = region.blocks().find(|b| bundle.blocks.contains_key(b))?;
            let mut data = Vec::new();
            for index in first..=region.last {
                let Some(block) = bundle.blocks.get(&index) else {
                    break;
                };
                data.extend_from_slice(block);
            }
            Some(NamedImage {
                name: region.name.to_owned(),
                address: (first as u32) << 12,
                data,
            })
        }
        Gap::Fill => {
            let mut data = Vec::with_capacity(region.blocks().count() * BLOCK_LEN);
            for index in region.blocks() {
                match bundle.blocks.get(&index) {
                    Some(block) => data.extend_from_slice(block),
                    None => data.extend_from_slice(&[0xFF; BLOCK_LEN]),
                }
            }
            Some(NamedImage {
                name: region.name.to_owned(),
                address: region.address(),
                data,
            })
        }
    }
}

/// The whole chip, erased flash standing in for missing blocks.
pub fn full_image(bundle: &FirmwareBundle) -> Vec<u8> {
    let mut data = Vec::with_capacity(BLOCK_COUNT * BLOCK_LEN);
    for index in 0..BLOCK_COUNT as u8 {
        match bundle.blocks.get(&index) {
            Some(block) => data.extend_from_slice(block),
            None => data.extend_from_slice(&[0xFF; BLOCK_LEN]),
        }
    }
    data
}

/// Read a run of bytes from the flash map, if fully present.
fn read_flash(bundle: &FirmwareBundle, offset: usize, len: usize) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(len);
    for pos in offset..offset + len {
        let block = bundle.blocks.get(&((pos / BLOCK_LEN) as u8))?;
        out.push(block[pos % BLOCK_LEN]);
    }
    Some(out)
}

/// Recover the application key from the bootloader, where it is kept
/// XORed with the bootloader's own key. Needs the bootloader blocks in
/// the map and known offsets for this family.
pub fn recover_app_key(bundle: &FirmwareBundle) -> Option<Vec<u8>> {
    let offsets = bundle.profile?.boot_offsets?;

    let boot_key = read_flash(bundle, offsets.boot_key, APP_KEY_LEN)?;
    let mut key = read_flash(bundle, offsets.crypt_app_key, APP_KEY_LEN)?;
    obfuscation::apply(&boot_key, &mut key);
    Some(key)
}

/// The bootloader's LCD banner and model tag, when the blocks holding
/// them are in the map.
pub fn boot_tags(bundle: &FirmwareBundle) -> Option<(String, String)> {
    let offsets = bundle.profile?.boot_offsets?;

    let banner = read_flash(bundle, offsets.banner, TAG_LEN)?;
    let tag = read_flash(bundle, offsets.model_tag, TAG_LEN)?;
    Some((tag_text(&banner), tag_text(&tag)))
}

/// The transport key as the bootloader carries it, for cross-checking
/// against the profile.
pub fn recover_midi_key(bundle: &FirmwareBundle) -> Option<Vec<u8>> {
    let profile = bundle.profile?;
    let offsets = profile.boot_offsets?;
    read_flash(bundle, offsets.midi_key, profile.midi_key.len())
}

fn tag_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\0')
        .to_owned()
}

/// The application region with its on-chip XOR peeled off.
///
/// The key comes out of the bootloader when it is in the map, else the
/// profile's well-known default.
pub fn app_image(bundle: &FirmwareBundle) -> Option<NamedImage> {
    let profile = bundle.profile?;
    let region = profile.region("application")?;
    let raw = region_image(bundle, region, Gap::Stop)?;

    let key = recover_app_key(bundle).unwrap_or_else(|| profile.app_key.to_vec());

    // a leading gap starts the image mid-key
    let skip = (raw.address - profile.app_address()) as usize % key.len();
    let mut data = raw.data;
    obfuscation::apply_skip(&key, &mut data, skip);

    Some(NamedImage {
        name: "application.decrypted".to_owned(),
        address: raw.address,
        data,
    })
}

/// All the named images present in a bundle: one per layout region,
/// plus the decrypted application.
pub fn partition(bundle: &FirmwareBundle) -> Vec<NamedImage> {
    let Some(profile) = bundle.profile else {
        return Vec::new();
    };

    let mut images = Vec::new();
    for region in profile.layout {
        if let Some(image) = region_image(bundle, region, Gap::Stop) {
            images.push(image);
        }
    }
    if let Some(image) = app_image(bundle) {
        images.push(image);
    }
    images
}

#[cfg(test)]
mod test {
    use std::collections::BTreeMap;

    use super::*;
    use crate::profile::PROFILES;
    use crate::update::{FlashBlock, Format};

    fn bundle_with(blocks: &[(u8, u8)]) -> FirmwareBundle {
        let mut map = BTreeMap::new();
        for (index, fill) in blocks {
            map.insert(
                *index,
                FlashBlock::new(*index, vec![*fill; BLOCK_LEN]).unwrap(),
            );
        }
        FirmwareBundle {
            profile: Some(&PROFILES[0]),
            blocks: map,
            format: Format::Raw,
            messages: BTreeMap::new(),
            model_id: None,
        }
    }

    #[test]
    fn gap_stop_ends_before_the_hole() {
        let bundle = bundle_with(&[(0x04, 0x11), (0x05, 0x22), (0x07, 0x33)]);
        let region = PROFILES[0].region("application").unwrap();

        let image = region_image(&bundle, region, Gap::Stop).unwrap();
        assert_eq!(image.address, 0x04000);
        assert_eq!(image.data.len(), 2 * BLOCK_LEN);
        assert_eq!(image.data[BLOCK_LEN], 0x22);
    }

    #[test]
    fn gap_stop_skips_leading_holes() {
        let bundle = bundle_with(&[(0x06, 0x11), (0x07, 0x22)]);
        let region = PROFILES[0].region("application").unwrap();

        let image = region_image(&bundle, region, Gap::Stop).unwrap();
        assert_eq!(image.address, 0x06000);
        assert_eq!(image.data.len(), 2 * BLOCK_LEN);
    }

    #[test]
    fn gap_stop_empty_region() {
        let bundle = bundle_with(&[(0x04, 0x11)]);
        let region = PROFILES[0].region("presets").unwrap();
        assert!(region_image(&bundle, region, Gap::Stop).is_none());
    }

    #[test]
    fn gap_fill_substitutes_erased_flash() {
        let bundle = bundle_with(&[(0x04, 0x11), (0x06, 0x33)]);
        let region = PROFILES[0].region("application").unwrap();

        let image = region_image(&bundle, region, Gap::Fill).unwrap();
        assert_eq!(image.address, 0x04000);
        assert_eq!(image.data.len(), (0x5A - 0x04 + 1) * BLOCK_LEN);
        assert!(image.data[BLOCK_LEN..2 * BLOCK_LEN].iter().all(|b| *b == 0xFF));
        assert_eq!(image.data[2 * BLOCK_LEN], 0x33);
    }

    #[test]
    fn full_image_is_the_whole_chip() {
        let bundle = bundle_with(&[(0x00, 0x11), (0x7F, 0x22)]);
        let image = full_image(&bundle);
        assert_eq!(image.len(), BLOCK_COUNT * BLOCK_LEN);
        assert_eq!(image[0], 0x11);
        assert_eq!(image[BLOCK_LEN], 0xFF);
        assert_eq!(image[0x7F * BLOCK_LEN], 0x22);
    }

    #[test]
    fn app_key_recovery_from_bootloader() {
        let profile = &PROFILES[0];
        let offsets = profile.boot_offsets.unwrap();
        let boot_key = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRS!";

        let mut bundle = bundle_with(&[(0x00, 0), (0x01, 0), (0x02, 0), (0x03, 0)]);
        let mut block3 = vec![0u8; BLOCK_LEN];
        for i in 0..APP_KEY_LEN {
            block3[offsets.boot_key % BLOCK_LEN + i] = boot_key[i];
            block3[offsets.crypt_app_key % BLOCK_LEN + i] = boot_key[i] ^ profile.app_key[i];
        }
        bundle
            .blocks
            .insert(0x03, FlashBlock::new(0x03, block3).unwrap());

        assert_eq!(recover_app_key(&bundle).unwrap(), profile.app_key.to_vec());
    }

    #[test]
    fn app_key_recovery_needs_the_bootloader() {
        let bundle = bundle_with(&[(0x04, 0x11)]);
        assert!(recover_app_key(&bundle).is_none());
    }

    #[test]
    fn boot_tags_read_out_of_the_bootloader() {
        let profile = &PROFILES[0];
        let offsets = profile.boot_offsets.unwrap();

        let mut bundle = bundle_with(&[]);
        let mut block2 = vec![0u8; BLOCK_LEN];
        let banner = b"FIRMWARE UPDATE V2.2";
        let at = offsets.model_tag % BLOCK_LEN;
        block2[at..at + profile.signature.magic.len()]
            .copy_from_slice(profile.signature.magic);
        bundle
            .blocks
            .insert(0x02, FlashBlock::new(0x02, block2).unwrap());

        let mut block3 = vec![0u8; BLOCK_LEN];
        let at = offsets.banner % BLOCK_LEN;
        block3[at..at + banner.len()].copy_from_slice(banner);
        bundle
            .blocks
            .insert(0x03, FlashBlock::new(0x03, block3).unwrap());

        let (got_banner, got_tag) = boot_tags(&bundle).unwrap();
        assert_eq!(got_banner, "FIRMWARE UPDATE V2.2");
        assert_eq!(got_tag, "DEQ2496V2 BOOTLOADER V2.2");
    }

    #[test]
    fn decrypted_application_uses_the_default_key() {
        let profile = &PROFILES[0];

        // an app region of key bytes decrypts to zeros
        let mut bundle = bundle_with(&[]);
        let mut block = vec![0u8; BLOCK_LEN];
        for (i, b) in block.iter_mut().enumerate() {
            *b = profile.app_key[i % APP_KEY_LEN];
        }
        bundle
            .blocks
            .insert(0x04, FlashBlock::new(0x04, block).unwrap());

        let image = app_image(&bundle).unwrap();
        assert_eq!(image.name, "application.decrypted");
        assert!(image.data.iter().all(|b| *b == 0));
    }

    #[test]
    fn decrypted_application_key_phase_survives_leading_gaps() {
        let profile = &PROFILES[0];

        // app starts one block late; the key cycle must start offset
        let mut bundle = bundle_with(&[]);
        let mut block = vec![0u8; BLOCK_LEN];
        for (i, b) in block.iter_mut().enumerate() {
            *b = profile.app_key[(BLOCK_LEN + i) % APP_KEY_LEN];
        }
        bundle
            .blocks
            .insert(0x05, FlashBlock::new(0x05, block).unwrap());

        let image = app_image(&bundle).unwrap();
        assert_eq!(image.address, 0x05000);
        assert!(image.data.iter().all(|b| *b == 0));
    }

    #[test]
    fn boot_key_offsets_check() {
        // the two key copies in block 3 must not overlap
        let offsets = PROFILES[0].boot_offsets.unwrap();
        assert!(offsets.boot_key + APP_KEY_LEN <= offsets.crypt_app_key);
        assert!(offsets.crypt_app_key + APP_KEY_LEN <= 4 * BLOCK_LEN);
    }
}
