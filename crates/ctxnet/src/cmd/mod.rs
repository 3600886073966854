use clap::{Args, Subcommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod demo;
pub mod varint;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the color-update scenario over an in-process network.
    Demo(DemoArgs),
    /// Show how signed varints are encoded.
    Varint(VarintArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Demo(args) => demo::run(args, format),
        Command::Varint(args) => varint::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Number of connected clients.
    #[arg(long, default_value = "2", value_parser = clap::value_parser!(u16).range(1..=64))]
    pub clients: u16,
    /// Color value to send.
    #[arg(long, default_value = "200")]
    pub value: u8,
    /// Color slot to update. Slots past the light's palette make clients
    /// drop the connection.
    #[arg(long, default_value = "0")]
    pub index: u8,
    /// Encode the channel in passthrough mode.
    #[arg(long)]
    pub passthrough: bool,
    /// How long to wait for each client to receive the update, in milliseconds.
    #[arg(long, default_value = "5000")]
    pub timeout_ms: u64,
}

#[derive(Args, Debug)]
pub struct VarintArgs {
    /// Values to encode.
    #[arg(required = true, allow_negative_numbers = true)]
    pub values: Vec<i32>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
