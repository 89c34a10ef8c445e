use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use serde_json::Value;

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::logging::{LogFormat, LogLevel};
use crate::output::OutputFormat;

pub mod demo;
pub mod invoke;
pub mod send;
pub mod serve;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the demo handlers on stdin/stdout.
    Serve(ServeArgs),
    /// Spawn `linerpc serve` as a child and exercise its handlers.
    Demo(DemoArgs),
    /// Spawn a command and invoke one of its handlers.
    Invoke(InvokeArgs),
    /// Spawn a command and send it one event.
    Send(SendArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(
    command: Command,
    format: OutputFormat,
    log_format: LogFormat,
    log_level: LogLevel,
) -> CliResult<i32> {
    match command {
        Command::Serve(args) => block_on(serve::run(args)),
        Command::Demo(args) => block_on(demo::run(args, format, log_format, log_level)),
        Command::Invoke(args) => block_on(invoke::run(args, format)),
        Command::Send(args) => block_on(send::run(args)),
        Command::Version(args) => version::run(args),
    }
}

fn block_on<F>(future: F) -> CliResult<i32>
where
    F: Future<Output = CliResult<i32>>,
{
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("runtime setup failed: {err}")))?;
    let result = runtime.block_on(future);
    // Stdin reads run on blocking threads that may never return.
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Schema directory (`<channel>.schema.json`) for args validation.
    #[arg(long, value_name = "DIR")]
    pub validate: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Maximum time to wait for each response (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Argument passed to every demo invocation.
    #[arg(long, default_value = "hoge")]
    pub message: String,
}

#[derive(Args, Debug)]
pub struct InvokeArgs {
    /// Channel to invoke.
    pub channel: String,
    /// Positional argument as JSON; repeat for more.
    #[arg(long = "arg", value_name = "JSON")]
    pub args: Vec<String>,
    /// Maximum time to wait for the response (e.g. 5s, 500ms).
    #[arg(long, default_value = "30s")]
    pub timeout: String,
    /// Child command and its arguments, after `--`.
    #[arg(last = true, required = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Channel to notify.
    pub channel: String,
    /// Positional argument as JSON; repeat for more.
    #[arg(long = "arg", value_name = "JSON")]
    pub args: Vec<String>,
    /// Time the child gets to exit after the event is sent (e.g. 2s).
    #[arg(long, default_value = "2s")]
    pub grace: String,
    /// Child command and its arguments, after `--`.
    #[arg(last = true, required = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}

/// Parse each `--arg` as a JSON value.
pub(crate) fn parse_json_args(raw: &[String]) -> CliResult<Vec<Value>> {
    raw.iter()
        .enumerate()
        .map(|(index, text)| {
            serde_json::from_str(text).map_err(|err| {
                CliError::new(
                    USAGE,
                    format!("--arg #{} is not valid JSON: {err}", index + 1),
                )
            })
        })
        .collect()
}

/// Split `command` into program and arguments.
pub(crate) fn split_command(command: &[String]) -> CliResult<(&str, &[String])> {
    match command.split_first() {
        Some((program, rest)) => Ok((program.as_str(), rest)),
        None => Err(CliError::new(USAGE, "missing child command after `--`")),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn json_args_parse_in_order() {
        let raw = vec!["\"hoge\"".to_string(), "1".to_string(), "[true]".to_string()];
        assert_eq!(
            parse_json_args(&raw).unwrap(),
            vec![json!("hoge"), json!(1), json!([true])]
        );
    }

    #[test]
    fn bare_words_are_not_json() {
        let err = parse_json_args(&["hoge".to_string()]).unwrap_err();
        assert_eq!(err.code, USAGE);
        assert!(err.message.contains("--arg #1"));
    }

    #[test]
    fn split_command_needs_program() {
        let command = vec!["cat".to_string(), "-u".to_string()];
        let (program, rest) = split_command(&command).unwrap();
        assert_eq!(program, "cat");
        assert_eq!(rest, ["-u".to_string()]);
        assert!(split_command(&[]).is_err());
    }
}
