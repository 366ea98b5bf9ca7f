//! `toolwire serve`: WebSocket listener running the bootstrap per client.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use toolwire_application::{ExchangeLogger, LoadInitialEventsUseCase, ProtocolParams};
use toolwire_domain::{ConversationRequest, HistoryPolicy};
use toolwire_infrastructure::{Connection, FileConfig, OriginPolicy, accept_websocket};
use tracing::{debug, info, warn};

/// Everything a client handler needs, shared across connections.
struct ServeContext {
    params: ProtocolParams,
    origin_policy: OriginPolicy,
    history_policy: HistoryPolicy,
    logger: Arc<dyn ExchangeLogger>,
}

pub async fn run(config: &FileConfig, logger: Arc<dyn ExchangeLogger>) -> Result<()> {
    let listener = TcpListener::bind(&config.server.listen)
        .await
        .with_context(|| format!("Failed to listen on {}", config.server.listen))?;
    info!("Listening for WebSocket clients on {}", listener.local_addr()?);

    let context = Arc::new(ServeContext {
        params: config.protocol.to_params(),
        origin_policy: config.server.origin_policy(),
        history_policy: config.history.policy(),
        logger,
    });
    if context.origin_policy == OriginPolicy::AllowAny {
        warn!("Accepting WebSocket handshakes from any origin");
    }

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        warn!("Accept failed: {}", e);
                        continue;
                    }
                };
                let context = Arc::clone(&context);
                tokio::spawn(async move {
                    handle_client(stream, peer, &context).await;
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, no longer accepting clients");
                return Ok(());
            }
        }
    }
}

async fn handle_client(stream: TcpStream, peer: SocketAddr, context: &ServeContext) {
    debug!("Client connected: {}", peer);
    let (reader, writer) = match accept_websocket(stream, &context.origin_policy).await {
        Ok(halves) => halves,
        Err(e) => {
            warn!("Handshake with {} failed: {}", peer, e);
            return;
        }
    };

    let connection = Arc::new(Connection::new(reader, writer, &context.params));
    let bootstrap = LoadInitialEventsUseCase::new(connection.clone())
        .with_history_policy(context.history_policy.clone())
        .with_logger(Arc::clone(&context.logger));

    let mut request = ConversationRequest::default();
    match bootstrap.execute(&mut request, context.params.init_timeout).await {
        Ok(events) => {
            info!(
                "Client {}: model={:?}, {} initial events, {} history turns",
                peer,
                request.model,
                events.len(),
                request.history.len()
            );
            if let Err(e) = connection.end_stream().await {
                warn!("Client {}: could not end stream: {}", peer, e);
            }
        }
        Err(e) => {
            warn!("Client {}: bootstrap failed: {}", peer, e);
            connection.send_error_best_effort(&e.to_string()).await;
        }
    }

    connection.shutdown();
}
