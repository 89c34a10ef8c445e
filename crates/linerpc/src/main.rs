mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "linerpc",
    version,
    about = "Line-delimited JSON RPC between processes"
)]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr). RUST_LOG takes precedence when set.
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format, cli.log_format, cli.log_level);

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
    fn parses_invoke_with_child_command() {
        let cli = Cli::try_parse_from([
            "linerpc",
            "invoke",
            "echo",
            "--arg",
            "\"hoge\"",
            "--",
            "linerpc",
            "serve",
        ])
        .expect("invoke args should parse");

        let Command::Invoke(args) = cli.command else {
            panic!("expected invoke subcommand");
        };
        assert_eq!(args.channel, "echo");
        assert_eq!(args.args, vec!["\"hoge\"".to_string()]);
        assert_eq!(args.command, vec!["linerpc".to_string(), "serve".to_string()]);
    }

    #[test]
    fn invoke_requires_child_command() {
        let err = Cli::try_parse_from(["linerpc", "invoke", "echo"])
            .expect_err("missing command should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn child_command_keeps_its_own_flags() {
        let cli = Cli::try_parse_from([
            "linerpc",
            "send",
            "ping",
            "--",
            "linerpc",
            "--log-level",
            "debug",
            "serve",
        ])
        .expect("send args should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send subcommand");
        };
        assert_eq!(args.command[1], "--log-level");
    }

    #[test]
    fn parses_serve_and_demo() {
        let cli = Cli::try_parse_from(["linerpc", "serve"]).expect("serve should parse");
        assert!(matches!(cli.command, Command::Serve(_)));

        let cli = Cli::try_parse_from(["linerpc", "--format", "json", "demo", "--timeout", "2s"])
            .expect("demo should parse");
        assert!(matches!(cli.command, Command::Demo(_)));
    }
}
