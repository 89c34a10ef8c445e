use linerpc_peer::{spawn_child, PeerBuilder};
use tracing::{debug, info};

use crate::cmd::{parse_duration, parse_json_args, split_command, SendArgs};
use crate::exit::{peer_error, transport_error, CliResult, SUCCESS};

pub async fn run(args: SendArgs) -> CliResult<i32> {
    let grace = parse_duration(&args.grace)?;
    let values = parse_json_args(&args.args)?;
    let (program, rest) = split_command(&args.command)?;

    let (peer, mut child) = spawn_child(program, rest, PeerBuilder::new())
        .map_err(|err| peer_error("spawn failed", err))?;

    let sent = peer.send(&args.channel, values).await;

    // Closing the child's stdin lets a well-behaved child drain and exit.
    peer.shutdown().await;
    let status = match tokio::time::timeout(grace, child.wait()).await {
        Ok(status) => status,
        Err(_) => {
            debug!(program, ?grace, "child still running after send");
            child.terminate(grace).await
        }
    }
    .map_err(|err| transport_error("child shutdown failed", err))?;

    sent.map_err(|err| peer_error("send failed", err))?;
    info!(channel = %args.channel, %status, "event sent");
    Ok(SUCCESS)
}
