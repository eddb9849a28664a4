use std::path::Path;

#[derive(clap::Args, Debug)]
pub struct DecodeOpts {
    /// Update stream or raw flash dump.
    input: String,

    /// Directory to write the logical images into.
    #[arg(short, long)]
    out: Option<String>,

    /// Also write the gap-filled whole-chip image.
    #[arg(long)]
    full: bool,
}

impl crate::ToolRun for DecodeOpts {
    fn run(&self) -> anyhow::Result<()> {
        let data = std::fs::read(&self.input)?;
        let bundle = deqlib::decode(&data)?;

        crate::common::report(&bundle);

        let images = deqlib::image::partition(&bundle);
        if bundle.profile.is_none() {
            log::warn!("no profile identified; only the whole-chip view is available");
        }

        for image in &images {
            println!(
                "{:24} {:#07x}  {} bytes",
                image.name,
                image.address,
                image.data.len()
            );
        }

        if let Some(ref out) = self.out {
            let out = Path::new(out);
            std::fs::create_dir_all(out)?;

            for image in &images {
                std::fs::write(out.join(format!("{}.bin", image.name)), &image.data)?;
            }

            if self.full {
                std::fs::write(out.join("fullchip.bin"), deqlib::image::full_image(&bundle))?;
            }
        }

        Ok(())
    }
}
