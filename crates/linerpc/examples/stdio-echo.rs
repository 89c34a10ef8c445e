//! Parent and child in one binary.
//!
//! Run without arguments: the example re-spawns itself with `child`, then
//! invokes the child's `echo` handler over the child's stdin/stdout.
//!
//! ```text
//! cargo run -p linerpc --example stdio-echo
//! ```

use std::time::Duration;

use linerpc::peer::{serve_stdio, spawn_child, PeerBuilder};
use serde_json::{json, Value};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::args().nth(1).as_deref() == Some("child") {
        return run_child().await;
    }

    let exe = std::env::current_exe()?;
    let (peer, mut child) = spawn_child(&exe, ["child"], PeerBuilder::new())?;

    peer.send("hello", vec![json!("from parent")]).await?;
    for word in ["hoge", "fuga"] {
        let reply = peer.invoke("echo", vec![json!(word)]).await?;
        println!("echo({word}) => {reply}");
    }

    peer.shutdown().await;
    let status = child.terminate(Duration::from_secs(2)).await?;
    println!("child exited with {status}");
    Ok(())
}

async fn run_child() -> Result<(), Box<dyn std::error::Error>> {
    let builder = PeerBuilder::new()
        .handle("echo", |args: Vec<Value>| async move {
            Ok(args.into_iter().next().unwrap_or(Value::Null))
        })
        .on("hello", |args: &[Value]| {
            // Stdout is the protocol stream.
            eprintln!("child got hello: {args:?}");
        });

    let peer = serve_stdio(builder);
    peer.closed().await;
    Ok(())
}
