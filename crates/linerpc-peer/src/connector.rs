use std::ffi::OsStr;

use linerpc_transport::{stdio, ChildProcess};
use tokio::process::Command;

use crate::error::Result;
use crate::peer::{Peer, PeerBuilder};

/// Spawn `program` and connect a peer to its stdin/stdout.
///
/// The caller keeps the [`ChildProcess`] and should
/// [`terminate`](ChildProcess::terminate) it when done.
pub fn spawn_child<I, S>(
    program: impl AsRef<OsStr>,
    args: I,
    builder: PeerBuilder,
) -> Result<(Peer, ChildProcess)>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let mut command = Command::new(program);
    command.args(args);
    spawn_command(command, builder)
}

/// [`spawn_child`] for a prepared command.
pub fn spawn_command(command: Command, builder: PeerBuilder) -> Result<(Peer, ChildProcess)> {
    let (child, streams) = ChildProcess::spawn_command(command)?;
    let (inbound, outbound) = streams.into_split();
    Ok((builder.connect(inbound, outbound), child))
}

/// Serve on the current process's stdin/stdout.
///
/// Stdout becomes the protocol stream; log to stderr only.
pub fn serve_stdio(builder: PeerBuilder) -> Peer {
    let (inbound, outbound) = stdio().into_split();
    builder.connect(inbound, outbound)
}
