use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One completed invocation, as reported by `invoke` and `demo`.
#[derive(Debug, Serialize)]
pub struct InvokeOutput {
    pub channel: String,
    pub args: Vec<Value>,
    #[serde(rename = "return")]
    pub result: Value,
    pub elapsed_ms: u64,
}

pub fn print_results(results: &[InvokeOutput], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            for out in results {
                println!(
                    "{}",
                    serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
                );
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "ARGS", "RETURN", "ELAPSED"]);
            for out in results {
                table.add_row(vec![
                    out.channel.clone(),
                    Value::from(out.args.clone()).to_string(),
                    out.result.to_string(),
                    format!("{}ms", out.elapsed_ms),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for out in results {
                println!(
                    "{}({}) => {}",
                    out.channel,
                    join_args(&out.args),
                    out.result
                );
            }
        }
        OutputFormat::Raw => {
            for out in results {
                print_raw(raw_value(&out.result).as_bytes());
                print_raw(b"\n");
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

/// Strings print without quotes; everything else as compact JSON.
fn raw_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn join_args(args: &[Value]) -> String {
    args.iter()
        .map(Value::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
