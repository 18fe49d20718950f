mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "wirepool", version, about = "Stream framing and worker pool CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "warn", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
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
    fn parses_encode_subcommand() {
        let cli = Cli::try_parse_from([
            "wirepool",
            "encode",
            "--header",
            "{\"type\":\"ping\"}",
            "--data",
            "hello",
        ])
        .expect("encode args should parse");

        assert!(matches!(cli.command, Command::Encode(_)));
    }

    #[test]
    fn rejects_conflicting_body_args() {
        let err = Cli::try_parse_from([
            "wirepool",
            "encode",
            "--data",
            "hello",
            "--file",
            "/tmp/body.bin",
        ])
        .expect_err("conflicting args should fail");

        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn pool_rejects_zero_workers() {
        let err = Cli::try_parse_from(["wirepool", "pool", "--workers", "0"])
            .expect_err("zero workers should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from([
            "wirepool",
            "decode",
            "--count",
            "2",
            "--format",
            "pretty",
            "--log-level",
            "debug",
        ])
        .expect("decode args should parse");

        assert_eq!(cli.format, Some(OutputFormat::Pretty));
        assert_eq!(cli.log_level, LogLevel::Debug);
        match cli.command {
            Command::Decode(args) => assert_eq!(args.count, Some(2)),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
