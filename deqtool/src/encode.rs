use std::collections::BTreeMap;

#[derive(clap::Args, Debug)]
pub struct EncodeOpts {
    /// Cleartext flash image to send.
    input: String,

    /// Output update stream.
    output: String,

    /// Device profile to build for.
    #[arg(long, default_value = "deq2496v2")]
    profile: String,

    /// Target flash address; defaults to the profile's application
    /// region.
    #[arg(long)]
    address: Option<String>,

    /// Queue LCD text before the given sub-block, as ORDINAL:TEXT.
    /// Repeatable.
    #[arg(short, long)]
    message: Vec<String>,
}

impl crate::ToolRun for EncodeOpts {
    fn run(&self) -> anyhow::Result<()> {
        let profile = deqlib::profile::find(&self.profile)?;

        let address = match self.address {
            Some(ref text) => crate::common::parse_address(text)?,
            None => profile.app_address(),
        };

        let mut messages = BTreeMap::new();
        for arg in &self.message {
            let (ordinal, text) = crate::common::parse_message(arg)?;
            messages.insert(ordinal, text);
        }

        let data = std::fs::read(&self.input)?;
        let events = deqlib::update::encode_events(profile, address, &data, &messages)?;

        eprintln!(
            "built {} events for {} bytes at {:#07x}",
            events.len(),
            data.len(),
            address
        );

        std::fs::write(&self.output, events.concat())?;
        Ok(())
    }
}
