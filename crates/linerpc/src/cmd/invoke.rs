use std::time::Instant;

use linerpc_peer::{spawn_child, Peer, PeerBuilder, PeerConfig};
use linerpc_transport::DEFAULT_TERMINATE_GRACE;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cmd::{parse_duration, parse_json_args, split_command, InvokeArgs};
use crate::exit::{peer_error, CliResult, SUCCESS};
use crate::output::{print_results, InvokeOutput, OutputFormat};

pub async fn run(args: InvokeArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let values = parse_json_args(&args.args)?;
    let (program, rest) = split_command(&args.command)?;

    let config = PeerConfig {
        invoke_timeout: Some(timeout),
        ..PeerConfig::default()
    };
    let (peer, mut child) = spawn_child(program, rest, PeerBuilder::new().with_config(config))
        .map_err(|err| peer_error("spawn failed", err))?;

    let outcome = invoke_timed(&peer, &args.channel, values).await;

    peer.shutdown().await;
    match child.terminate(DEFAULT_TERMINATE_GRACE).await {
        Ok(status) => debug!(program, %status, "child exited"),
        Err(err) => warn!(program, error = %err, "terminating child failed"),
    }

    print_results(&[outcome?], format);
    Ok(SUCCESS)
}

/// Invoke `channel` and record how long the response took.
pub(crate) async fn invoke_timed(
    peer: &Peer,
    channel: &str,
    args: Vec<Value>,
) -> CliResult<InvokeOutput> {
    let started = Instant::now();
    let result = peer
        .invoke(channel, args.clone())
        .await
        .map_err(|err| peer_error(&format!("invoke {channel:?} failed"), err))?;

    Ok(InvokeOutput {
        channel: channel.to_string(),
        args,
        result,
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
    })
}
