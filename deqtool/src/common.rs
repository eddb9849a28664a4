use std::collections::BTreeMap;

use deqlib::{FirmwareBundle, FlashBlock};

/// Parse a flash address, accepting `0x`-prefixed hex or decimal.
pub fn parse_address(text: &str) -> anyhow::Result<u32> {
    let addr = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16)?
    } else {
        text.parse()?
    };
    Ok(addr)
}

/// Parse an `ORDINAL:TEXT` display message argument.
pub fn parse_message(text: &str) -> anyhow::Result<(usize, String)> {
    let (ordinal, message) = text
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("expected ORDINAL:TEXT, got {:?}", text))?;
    Ok((ordinal.parse()?, message.to_owned()))
}

/// Summarize a sparse block map as hex ranges, e.g. `04-5a, 74`.
pub fn block_ranges(blocks: &BTreeMap<u8, FlashBlock>) -> String {
    let mut parts = Vec::new();
    let mut run: Option<(u8, u8)> = None;

    for &index in blocks.keys() {
        run = match run {
            Some((first, last)) if index == last + 1 => Some((first, index)),
            Some((first, last)) => {
                parts.push(range_str(first, last));
                Some((index, index))
            }
            None => Some((index, index)),
        };
    }
    if let Some((first, last)) = run {
        parts.push(range_str(first, last));
    }

    if parts.is_empty() {
        "none".to_owned()
    } else {
        parts.join(", ")
    }
}

fn range_str(first: u8, last: u8) -> String {
    if first == last {
        format!("{:02x}", first)
    } else {
        format!("{:02x}-{:02x}", first, last)
    }
}

/// Print what a decode pass recovered.
pub fn report(bundle: &FirmwareBundle) {
    println!("format:  {}", bundle.format);
    match bundle.profile {
        Some(profile) => println!("profile: {}", profile.name),
        None => println!("profile: unidentified"),
    }
    if let Some(model_id) = bundle.model_id {
        println!("model:   {:#04x}", model_id);
    }
    println!(
        "blocks:  {} ({})",
        bundle.blocks.len(),
        block_ranges(&bundle.blocks)
    );

    for (ordinal, text) in &bundle.messages {
        println!("display at {}: {:?}", ordinal, text);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use deqlib::update::BLOCK_LEN;

    #[test]
    fn addresses() {
        assert_eq!(parse_address("0x04000").unwrap(), 0x04000);
        assert_eq!(parse_address("16384").unwrap(), 16384);
        assert!(parse_address("xyz").is_err());
    }

    #[test]
    fn messages() {
        let (ordinal, text) = parse_message("16:READY").unwrap();
        assert_eq!((ordinal, text.as_str()), (16, "READY"));
        assert!(parse_message("no separator").is_err());
    }

    #[test]
    fn ranges() {
        let mut blocks = BTreeMap::new();
        for index in [0u8, 1, 2, 5, 7, 8] {
            blocks.insert(
                index,
                FlashBlock::new(index, vec![0; BLOCK_LEN]).unwrap(),
            );
        }
        assert_eq!(block_ranges(&blocks), "00-02, 05, 07-08");
        assert_eq!(block_ranges(&BTreeMap::new()), "none");
    }
}
