use std::path::Path;
use std::time::Duration;

use linerpc_peer::{serve_stdio, PeerBuilder};
use linerpc_schema::{RegistryConfig, SchemaRegistry};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::cmd::ServeArgs;
use crate::exit::{CliError, CliResult, DATA_INVALID, SUCCESS};

pub async fn run(args: ServeArgs) -> CliResult<i32> {
    let mut builder = demo_builder();
    if let Some(dir) = &args.validate {
        builder = builder.with_schema_registry(load_schemas(dir)?);
    }

    let peer = serve_stdio(builder);
    info!(
        channels = ?peer.registry().handler_channels(),
        pid = std::process::id(),
        "serving on stdio"
    );

    tokio::select! {
        _ = peer.closed() => info!("stdin closed"),
        _ = termination_signal() => info!("termination requested"),
    }

    peer.shutdown().await;
    Ok(SUCCESS)
}

/// Handlers and listeners served by `linerpc serve`.
pub(crate) fn demo_builder() -> PeerBuilder {
    PeerBuilder::new()
        .handle("echo", |args: Vec<Value>| async move {
            Ok(args.into_iter().next().unwrap_or(Value::Null))
        })
        .handle("sleep", |args: Vec<Value>| async move {
            let millis = args.first().and_then(Value::as_u64).unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(millis)).await;
            Ok(json!(millis))
        })
        .handle("test", |_args: Vec<Value>| async { Ok(json!([1, 2, 3])) })
        .handle("test2", |_args: Vec<Value>| async { Ok(json!("hello")) })
        .on("ping", |args: &[Value]| {
            let args = Value::from(args.to_vec());
            info!(args = %args, "ping received");
        })
}

fn load_schemas(dir: &Path) -> CliResult<SchemaRegistry> {
    let registry = SchemaRegistry::from_directory_with_config(
        dir,
        RegistryConfig {
            fail_on_missing_schema: false,
            ..RegistryConfig::default()
        },
    )
    .map_err(|err| CliError::new(DATA_INVALID, format!("schema load failed: {err}")))?;

    info!(channels = ?registry.channels(), dir = %dir.display(), "loaded schemas");
    Ok(registry)
}

async fn termination_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = terminate.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
                return;
            }
            Err(err) => warn!(error = %err, "SIGTERM handler unavailable"),
        }
    }

    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "ctrl-c handler unavailable");
        std::future::pending::<()>().await;
    }
}
