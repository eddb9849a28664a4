use clap::Parser;

mod common;
mod decode;
mod encode;
mod hexdump;
mod info;

trait ToolRun {
    fn run(&self) -> anyhow::Result<()>;
}

#[derive(clap::Parser, Debug)]
#[command(version, about = "Inspect, unpack, and build DEQ2496 firmware updates")]
struct ToolOptions {
    #[command(subcommand)]
    command: ToolCommand,
}

#[derive(clap::Subcommand, Debug)]
enum ToolCommand {
    /// Decode an update stream or flash dump into its logical images.
    Decode(decode::DecodeOpts),
    /// Build a SysEx update stream from a flash image.
    Encode(encode::EncodeOpts),
    /// Identify a firmware file and list what it carries.
    Info(info::InfoOpts),
}

impl ToolRun for ToolCommand {
    fn run(&self) -> anyhow::Result<()> {
        use ToolCommand::*;
        match self {
            Decode(o) => o.run(),
            Encode(o) => o.run(),
            Info(o) => o.run(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    ToolOptions::parse().command.run()
}
