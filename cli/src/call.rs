//! `toolwire call`: one tool call through a local executor process.

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use toolwire_application::{EnvelopeChannel, ExchangeLogger, ExecuteToolUseCase, ToolExecutorPort};
use toolwire_domain::ToolCall;
use toolwire_infrastructure::{Connection, FileConfig};
use tracing::{debug, trace};

pub async fn run(
    config: &FileConfig,
    tool: &str,
    raw_args: &str,
    id: Option<String>,
    logger: Arc<dyn ExchangeLogger>,
) -> Result<()> {
    let arguments: HashMap<String, Value> =
        serde_json::from_str(raw_args).context("--args must be a JSON object")?;
    let command = config
        .executor
        .command
        .as_deref()
        .context("No executor configured: set executor.command or pass --executor")?;

    let params = config.protocol.to_params();
    let working_dir = config.executor.working_dir.as_deref();

    let connection = Arc::new(
        Connection::spawn_executor(
            command,
            &config.executor.args,
            working_dir.map(Path::new),
            &params,
        )
        .with_context(|| format!("Failed to start executor {}", command))?,
    );

    // Every inbound envelope also lands on the general queue; keep it drained.
    let drain = {
        let connection = Arc::clone(&connection);
        tokio::spawn(async move {
            while let Ok(envelope) = connection.next_general().await {
                trace!("Executor sent {}", envelope.kind);
            }
        })
    };

    let mut bridge = ExecuteToolUseCase::new(connection.clone())
        .with_logger(logger)
        .with_timeout(params.tool_timeout);
    if let Some(dir) = working_dir {
        bridge = bridge.with_default_working_dir(dir);
    }

    let call_id = id.unwrap_or_else(|| {
        format!("call-{}-{}", std::process::id(), chrono::Utc::now().timestamp_millis())
    });
    let call = ToolCall::new(call_id, tool).with_arguments(arguments);
    debug!("Delegating {} as {}", call.name, call.id);

    let result = bridge.execute(&call).await;
    connection.shutdown();
    let _ = drain.await;

    let result = result.with_context(|| format!("Tool call {} failed", call.id))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
