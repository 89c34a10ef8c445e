use linerpc_peer::{spawn_child, Peer, PeerBuilder, PeerConfig};
use linerpc_transport::DEFAULT_TERMINATE_GRACE;
use serde_json::json;
use tracing::{debug, info};

use crate::cmd::invoke::invoke_timed;
use crate::cmd::{parse_duration, DemoArgs};
use crate::exit::{io_error, peer_error, transport_error, CliResult, SUCCESS};
use crate::logging::{child_log_args, LogFormat, LogLevel};
use crate::output::{print_results, InvokeOutput, OutputFormat};

/// Channels exercised by the demo, in order.
pub(crate) const DEMO_CHANNELS: [&str; 3] = ["echo", "test", "test2"];

pub async fn run(
    args: DemoArgs,
    format: OutputFormat,
    log_format: LogFormat,
    log_level: LogLevel,
) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let exe = std::env::current_exe()
        .map_err(|err| io_error("cannot locate linerpc executable", err))?;

    let config = PeerConfig {
        invoke_timeout: Some(timeout),
        ..PeerConfig::default()
    };
    let mut child_args = child_log_args(log_format, log_level).to_vec();
    child_args.push("serve");
    let (peer, mut child) = spawn_child(
        &exe,
        child_args,
        PeerBuilder::new().with_config(config),
    )
    .map_err(|err| peer_error("spawn failed", err))?;
    info!(pid = ?child.id(), "spawned demo child");

    let outcome = exercise(&peer, &args.message).await;

    peer.shutdown().await;
    let status = child
        .terminate(DEFAULT_TERMINATE_GRACE)
        .await
        .map_err(|err| transport_error("terminate failed", err))?;
    debug!(%status, "demo child exited");

    print_results(&outcome?, format);
    Ok(SUCCESS)
}

/// Ping the child, then invoke each demo channel with `message`.
pub(crate) async fn exercise(peer: &Peer, message: &str) -> CliResult<Vec<InvokeOutput>> {
    peer.send("ping", vec![json!(message)])
        .await
        .map_err(|err| peer_error("send failed", err))?;

    let mut results = Vec::with_capacity(DEMO_CHANNELS.len());
    for channel in DEMO_CHANNELS {
        results.push(invoke_timed(peer, channel, vec![json!(message)]).await?);
    }
    Ok(results)
}
