//! Load Initial Events use case — the bootstrap handshake.
//!
//! Before the live exchange starts, a client may push:
//!
//! 1. any number of `stream_init_request` envelopes, each replacing the
//!    working request wholesale (last one wins),
//! 2. ordinary conversational envelopes to replay as prior turns,
//! 3. a `stream_init_events_finished` sentinel.
//!
//! Only the general queue is read. The working request is updated only if
//! the sentinel arrives before the deadline.

use crate::ports::envelope_channel::EnvelopeChannel;
use crate::ports::exchange_logger::{ExchangeEvent, ExchangeLogger, NoExchangeLogger};
use std::sync::Arc;
use std::time::Duration;
use toolwire_domain::{ConversationRequest, Envelope, EnvelopeKind, HistoryPolicy, ProtocolError};
use tracing::{debug, info};

pub struct LoadInitialEventsUseCase {
    channel: Arc<dyn EnvelopeChannel>,
    history_policy: HistoryPolicy,
    logger: Arc<dyn ExchangeLogger>,
}

impl LoadInitialEventsUseCase {
    pub fn new(channel: Arc<dyn EnvelopeChannel>) -> Self {
        Self {
            channel,
            history_policy: HistoryPolicy::default(),
            logger: Arc::new(NoExchangeLogger),
        }
    }

    pub fn with_history_policy(mut self, policy: HistoryPolicy) -> Self {
        self.history_policy = policy;
        self
    }

    pub fn with_logger(mut self, logger: Arc<dyn ExchangeLogger>) -> Self {
        self.logger = logger;
        self
    }

    /// Run the handshake against `request`.
    ///
    /// Returns every non-control envelope seen before the sentinel, in
    /// arrival order. The history-sendable subset is appended to
    /// `request.history`. On timeout or a closed transport `request` is left
    /// untouched and no partial list is returned.
    pub async fn execute(
        &self,
        request: &mut ConversationRequest,
        timeout: Duration,
    ) -> Result<Vec<Envelope>, ProtocolError> {
        let working = request.clone();
        let (mut working, events) = tokio::time::timeout(timeout, self.collect(working))
            .await
            .map_err(|_| {
                ProtocolError::Timeout(format!(
                    "no {} within {:?}",
                    EnvelopeKind::StreamInitEventsFinished,
                    timeout
                ))
            })??;

        let history = self.history_policy.filter(events.clone());
        info!(
            "Initial events loaded: {} received, {} replayable",
            events.len(),
            history.len()
        );
        self.logger.log(ExchangeEvent::new(
            "init_finished",
            serde_json::json!({
                "events": events.len(),
                "history": history.len(),
            }),
        ));

        working.attach_history(history);
        *request = working;
        Ok(events)
    }

    async fn collect(
        &self,
        mut request: ConversationRequest,
    ) -> Result<(ConversationRequest, Vec<Envelope>), ProtocolError> {
        let mut events = Vec::new();

        loop {
            let envelope = self.channel.next_general().await?;
            match envelope.kind {
                EnvelopeKind::StreamInitRequest => {
                    request = serde_json::from_str(&envelope.content)?;
                    debug!(
                        "Init request replaced working request (model={})",
                        request.model
                    );
                    self.logger.log(ExchangeEvent::new(
                        "init_request",
                        serde_json::json!({
                            "model": request.model,
                            "bytes": envelope.content.len(),
                        }),
                    ));
                }
                EnvelopeKind::StreamInitEventsFinished => {
                    return Ok((request, events));
                }
                _ => events.push(envelope),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Channel whose general queue is a fixed script; when the script runs
    /// out it either pends forever or reports a closed transport.
    struct ScriptedGeneral {
        queue: Mutex<VecDeque<Envelope>>,
        close_when_empty: bool,
    }

    impl ScriptedGeneral {
        fn new(envelopes: Vec<Envelope>, close_when_empty: bool) -> Arc<Self> {
            Arc::new(Self {
                queue: Mutex::new(envelopes.into()),
                close_when_empty,
            })
        }
    }

    #[async_trait]
    impl EnvelopeChannel for ScriptedGeneral {
        async fn correlated_request(
            &self,
            _outbound: Envelope,
            _expected: EnvelopeKind,
            _deadline: Duration,
        ) -> Result<Envelope, ProtocolError> {
            Err(ProtocolError::TransportClosed)
        }

        async fn next_general(&self) -> Result<Envelope, ProtocolError> {
            let next = self.queue.lock().unwrap().pop_front();
            match next {
                Some(envelope) => Ok(envelope),
                None if self.close_when_empty => Err(ProtocolError::TransportClosed),
                None => std::future::pending().await,
            }
        }

        async fn emit(&self, _envelope: Envelope) -> Result<(), ProtocolError> {
            Ok(())
        }
    }

    fn turn(kind: &str, content: &str) -> Envelope {
        Envelope::new(EnvelopeKind::conversation(kind)).with_content(content)
    }

    fn init_request(model: &str) -> Envelope {
        let descriptor = ConversationRequest::new(model, "live prompt");
        Envelope::new(EnvelopeKind::StreamInitRequest)
            .with_content(serde_json::to_string(&descriptor).unwrap())
    }

    #[tokio::test]
    async fn returns_events_in_arrival_order_without_control_envelopes() {
        let channel = ScriptedGeneral::new(
            vec![
                turn("user", "1"),
                init_request("model-a"),
                turn("assistant", "2"),
                turn("reasoning", "3"),
                Envelope::new(EnvelopeKind::StreamInitEventsFinished),
                turn("user", "after sentinel"),
            ],
            false,
        );
        let use_case = LoadInitialEventsUseCase::new(channel);

        let mut request = ConversationRequest::new("default", "p");
        let events = use_case
            .execute(&mut request, Duration::from_secs(1))
            .await
            .unwrap();

        let contents: Vec<&str> = events.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["1", "2", "3"]);
        assert!(events.iter().all(|e| !e.kind.is_control()));

        assert_eq!(request.model, "model-a");
        let history: Vec<&str> = request.history.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(history, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn last_init_request_wins() {
        let channel = ScriptedGeneral::new(
            vec![
                init_request("first"),
                init_request("second"),
                Envelope::new(EnvelopeKind::StreamInitEventsFinished),
            ],
            false,
        );
        let use_case = LoadInitialEventsUseCase::new(channel);

        let mut request = ConversationRequest::new("default", "p");
        let events = use_case
            .execute(&mut request, Duration::from_secs(1))
            .await
            .unwrap();

        assert!(events.is_empty());
        assert_eq!(request.model, "second");
        assert_eq!(request.prompt, "live prompt");
    }

    #[tokio::test]
    async fn times_out_without_sentinel_and_leaves_request_untouched() {
        let channel = ScriptedGeneral::new(
            vec![init_request("replaced"), turn("user", "1")],
            false,
        );
        let use_case = LoadInitialEventsUseCase::new(channel);

        let mut request = ConversationRequest::new("original", "p");
        let err = use_case
            .execute(&mut request, Duration::from_millis(50))
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(request.model, "original");
        assert!(request.history.is_empty());
    }

    #[tokio::test]
    async fn closed_transport_fails_the_handshake() {
        let channel = ScriptedGeneral::new(vec![turn("user", "1")], true);
        let use_case = LoadInitialEventsUseCase::new(channel);

        let mut request = ConversationRequest::default();
        let err = use_case
            .execute(&mut request, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_closed());
    }

    #[tokio::test]
    async fn undecodable_init_request_is_a_serialization_error() {
        let channel = ScriptedGeneral::new(
            vec![Envelope::new(EnvelopeKind::StreamInitRequest).with_content("not json")],
            false,
        );
        let use_case = LoadInitialEventsUseCase::new(channel);

        let mut request = ConversationRequest::default();
        let err = use_case
            .execute(&mut request, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProtocolError::Serialization(_)));
    }

    #[tokio::test]
    async fn custom_history_policy_controls_replay() {
        let channel = ScriptedGeneral::new(
            vec![
                turn("user", "1"),
                turn("reasoning", "2"),
                Envelope::new(EnvelopeKind::StreamInitEventsFinished),
            ],
            false,
        );
        let use_case = LoadInitialEventsUseCase::new(channel)
            .with_history_policy(HistoryPolicy::from_kinds(["reasoning"]));

        let mut request = ConversationRequest::default();
        use_case
            .execute(&mut request, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(request.history.len(), 1);
        assert_eq!(request.history[0].content, "2");
    }
}
