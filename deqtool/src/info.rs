#[derive(clap::Args, Debug)]
pub struct InfoOpts {
    /// Update stream or raw flash dump.
    input: String,

    /// Hexdump the head of each logical image.
    #[arg(long)]
    dump: bool,
}

impl crate::ToolRun for InfoOpts {
    fn run(&self) -> anyhow::Result<()> {
        let data = std::fs::read(&self.input)?;
        let bundle = deqlib::decode(&data)?;

        crate::common::report(&bundle);

        if let Some((banner, tag)) = deqlib::image::boot_tags(&bundle) {
            println!("banner:  {:?}", banner);
            println!("tag:     {:?}", tag);
        }

        if let (Some(profile), Some(key)) =
            (bundle.profile, deqlib::image::recover_midi_key(&bundle))
        {
            if key != profile.midi_key {
                log::warn!("bootloader carries a different transport key than the profile");
            }
        }

        for image in deqlib::image::partition(&bundle) {
            println!(
                "{:24} {:#07x}  {} bytes",
                image.name,
                image.address,
                image.data.len()
            );
            if self.dump {
                let head = image.data.len().min(0x40);
                crate::hexdump::hexdump_prefix("  ", image.address, &image.data[..head]);
            }
        }

        Ok(())
    }
}
