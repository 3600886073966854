mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "ctxnet", version, about = "ctxnet channel toolkit")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true, env = "CTXNET_LOG_LEVEL")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    match cmd::run(cli.command, format) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_demo_subcommand() {
        let cli = Cli::try_parse_from([
            "ctxnet", "demo", "--clients", "3", "--value", "17", "--index", "2",
        ])
        .expect("demo args should parse");

        match cli.command {
            Command::Demo(args) => {
                assert_eq!(args.clients, 3);
                assert_eq!(args.value, 17);
                assert_eq!(args.index, 2);
                assert!(!args.passthrough);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn varint_accepts_negative_values() {
        let cli = Cli::try_parse_from(["ctxnet", "varint", "--", "-1", "300"])
            .expect("varint args should parse");

        match cli.command {
            Command::Varint(args) => assert_eq!(args.values, vec![-1, 300]),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_zero_clients() {
        let err = Cli::try_parse_from(["ctxnet", "demo", "--clients", "0"])
            .expect_err("zero clients should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
