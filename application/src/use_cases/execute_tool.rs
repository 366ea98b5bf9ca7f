//! Execute Tool use case — delegate one tool call to the far side.
//!
//! The call becomes a `stream_request_tool` envelope whose `streamId` is the
//! call id; the far side answers with a `stream_response_tool` on the same
//! stream. Interim envelopes (e.g. an acknowledgment) are discarded by the
//! channel's correlated wait.
//!
//! # Response decoding
//!
//! | Response | Result |
//! |----------|--------|
//! | `metadata.ok` absent or `false` | declined: no content, no error |
//! | content not wrapped in `{` … `}` | `{"result": content}` |
//! | object that decodes strictly | the decoded object |
//! | object that fails strict decoding | `ok = false`, error = decoder message |

use crate::config::ProtocolParams;
use crate::ports::envelope_channel::EnvelopeChannel;
use crate::ports::exchange_logger::{ExchangeEvent, ExchangeLogger, NoExchangeLogger};
use crate::ports::tool_executor::ToolExecutorPort;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use toolwire_domain::{
    Envelope, EnvelopeKind, META_DEFAULT_WORKING_DIR, META_OK, ProtocolError, ToolCall,
    ToolResult,
};
use tracing::{debug, warn};

/// Runs tool calls through an [`EnvelopeChannel`].
pub struct ExecuteToolUseCase {
    channel: Arc<dyn EnvelopeChannel>,
    logger: Arc<dyn ExchangeLogger>,
    timeout: Duration,
    default_working_dir: String,
}

impl ExecuteToolUseCase {
    pub fn new(channel: Arc<dyn EnvelopeChannel>) -> Self {
        Self {
            channel,
            logger: Arc::new(NoExchangeLogger),
            timeout: ProtocolParams::default().tool_timeout,
            default_working_dir: String::new(),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn ExchangeLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_default_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.default_working_dir = dir.into();
        self
    }

    /// Execute `call` with an explicit default working directory.
    ///
    /// Validation and argument serialization happen before any I/O.
    /// Timeouts and closed transports propagate unchanged; a response that
    /// arrives but cannot be decoded is reported inside the [`ToolResult`].
    pub async fn execute_in(
        &self,
        call: &ToolCall,
        default_working_dir: &str,
    ) -> Result<ToolResult, ProtocolError> {
        let request = build_tool_request(call, default_working_dir)?;

        debug!(
            "Tool request: {} (stream_id={}, {} bytes)",
            call.name,
            call.id,
            request.content.len()
        );
        self.logger.log(ExchangeEvent::new(
            "tool_request",
            serde_json::json!({
                "stream_id": call.id,
                "tool": call.name,
                "arguments": request.content,
            }),
        ));

        let response = self
            .channel
            .correlated_request(request, EnvelopeKind::StreamResponseTool, self.timeout)
            .await?;

        let result = decode_tool_response(&response);

        if result.is_declined() {
            debug!("Tool {} declined by executor (stream_id={})", call.name, call.id);
            self.logger.log(ExchangeEvent::new(
                "tool_declined",
                serde_json::json!({ "stream_id": call.id, "tool": call.name }),
            ));
        } else {
            if !result.is_ok() {
                warn!(
                    "Tool {} response could not be decoded: {}",
                    call.name, result.error
                );
            }
            self.logger.log(ExchangeEvent::new(
                "tool_response",
                serde_json::json!({
                    "stream_id": call.id,
                    "tool": call.name,
                    "ok": result.is_ok(),
                    "error": result.error,
                    "content_bytes": response.content.len(),
                }),
            ));
        }

        Ok(result)
    }
}

#[async_trait]
impl ToolExecutorPort for ExecuteToolUseCase {
    async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ProtocolError> {
        self.execute_in(call, &self.default_working_dir).await
    }
}

/// Build the `stream_request_tool` envelope for `call`.
pub fn build_tool_request(
    call: &ToolCall,
    default_working_dir: &str,
) -> Result<Envelope, ProtocolError> {
    if call.id.is_empty() {
        return Err(ProtocolError::Validation(format!(
            "tool call '{}' has an empty id",
            call.name
        )));
    }

    let arguments = serde_json::to_string(&call.arguments)?;

    Ok(Envelope::new(EnvelopeKind::StreamRequestTool)
        .with_stream_id(call.id.clone())
        .with_tool_name(call.name.clone())
        .with_content(arguments)
        .with_metadata(META_DEFAULT_WORKING_DIR, default_working_dir))
}

/// Interpret a `stream_response_tool` envelope.
pub fn decode_tool_response(response: &Envelope) -> ToolResult {
    if !response.metadata_bool(META_OK).unwrap_or(false) {
        return ToolResult::declined();
    }

    let content = response.content.as_str();
    if !(content.starts_with('{') && content.ends_with('}')) {
        let wrapped = serde_json::json!({ "result": response.content });
        return ToolResult::completed(wrapped, response.error.clone());
    }

    match decode_strict(content) {
        Ok(value) => ToolResult::completed(value, response.error.clone()),
        Err(e) => ToolResult::undecodable(e.to_string()),
    }
}

/// Decode exactly one JSON value; anything after it is an error.
fn decode_strict(content: &str) -> Result<Value, serde_json::Error> {
    let mut deserializer = serde_json::Deserializer::from_str(content);
    let value = Value::deserialize(&mut deserializer)?;
    deserializer.end()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Channel that records the outbound envelope and answers from a script.
    struct ScriptedChannel {
        reply: Mutex<Option<Result<Envelope, ProtocolError>>>,
        sent: Mutex<Vec<(Envelope, EnvelopeKind)>>,
    }

    impl ScriptedChannel {
        fn replying(reply: Result<Envelope, ProtocolError>) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(reply)),
                sent: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl EnvelopeChannel for ScriptedChannel {
        async fn correlated_request(
            &self,
            outbound: Envelope,
            expected: EnvelopeKind,
            _deadline: Duration,
        ) -> Result<Envelope, ProtocolError> {
            self.sent.lock().unwrap().push((outbound, expected));
            self.reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Err(ProtocolError::TransportClosed))
        }

        async fn next_general(&self) -> Result<Envelope, ProtocolError> {
            Err(ProtocolError::TransportClosed)
        }

        async fn emit(&self, _envelope: Envelope) -> Result<(), ProtocolError> {
            Ok(())
        }
    }

    fn response(content: &str) -> Envelope {
        Envelope::new(EnvelopeKind::StreamResponseTool)
            .with_stream_id("call-1")
            .with_content(content)
            .with_metadata(META_OK, true)
    }

    #[test]
    fn build_rejects_empty_id() {
        let call = ToolCall::new("", "read_file");
        let err = build_tool_request(&call, "/work").unwrap_err();
        assert!(matches!(err, ProtocolError::Validation(_)));
    }

    #[test]
    fn build_sets_stream_id_tool_name_and_working_dir() {
        let call = ToolCall::new("call-7", "grep").with_arg("pattern", "fn main");
        let envelope = build_tool_request(&call, "/repo").unwrap();

        assert_eq!(envelope.kind, EnvelopeKind::StreamRequestTool);
        assert_eq!(envelope.stream_id, "call-7");
        assert_eq!(envelope.tool_name, "grep");
        assert_eq!(envelope.metadata_str(META_DEFAULT_WORKING_DIR), Some("/repo"));
        let args: Value = serde_json::from_str(&envelope.content).unwrap();
        assert_eq!(args["pattern"], "fn main");
    }

    #[test]
    fn decode_wraps_plain_text() {
        let result = decode_tool_response(&response("hello"));
        assert!(result.is_ok());
        assert_eq!(result.content, Some(serde_json::json!({"result": "hello"})));
    }

    #[test]
    fn decode_wraps_object_with_surrounding_whitespace() {
        let result = decode_tool_response(&response(" {\"a\":1}"));
        assert!(result.is_ok());
        assert_eq!(result.content, Some(serde_json::json!({"result": " {\"a\":1}"})));

        let result = decode_tool_response(&response("{\"a\":1}\n"));
        assert_eq!(result.content, Some(serde_json::json!({"result": "{\"a\":1}\n"})));
    }

    #[test]
    fn decode_preserves_large_integers() {
        let result = decode_tool_response(&response(r#"{"a":9007199254740993}"#));
        assert!(result.is_ok());
        let content = result.content.unwrap();
        assert_eq!(content["a"].to_string(), "9007199254740993");
        assert_eq!(content, serde_json::json!({"a": 9007199254740993u64}));
    }

    #[test]
    fn decode_rejects_concatenated_objects() {
        let result = decode_tool_response(&response(r#"{"a":1}{"b":2}"#));
        assert!(!result.is_ok());
        assert!(result.content.is_none());
        assert!(!result.error.is_empty());
    }

    #[test]
    fn decode_declines_when_ok_flag_false_or_missing() {
        let declined = Envelope::new(EnvelopeKind::StreamResponseTool)
            .with_content(r#"{"a":1}"#)
            .with_metadata(META_OK, false);
        assert_eq!(decode_tool_response(&declined), ToolResult::declined());

        let missing = Envelope::new(EnvelopeKind::StreamResponseTool).with_content("anything");
        assert_eq!(decode_tool_response(&missing), ToolResult::declined());
    }

    #[test]
    fn decode_attaches_executor_error_verbatim() {
        let envelope = response("exit status 2").with_error("command failed");
        let result = decode_tool_response(&envelope);
        assert!(result.is_ok());
        assert_eq!(result.error, "command failed");
    }

    #[tokio::test]
    async fn execute_sends_request_and_decodes_response() {
        let channel = ScriptedChannel::replying(Ok(response(r#"{"lines":3}"#)));
        let use_case = ExecuteToolUseCase::new(channel.clone())
            .with_default_working_dir("/repo")
            .with_timeout(Duration::from_secs(1));

        let call = ToolCall::new("call-1", "read_file").with_arg("path", "a.rs");
        let result = use_case.execute(&call).await.unwrap();

        assert!(result.is_ok());
        assert_eq!(result.content.unwrap()["lines"], 3);

        let sent = channel.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1, EnvelopeKind::StreamResponseTool);
        assert_eq!(sent[0].0.stream_id, "call-1");
        assert_eq!(sent[0].0.metadata_str(META_DEFAULT_WORKING_DIR), Some("/repo"));
    }

    #[tokio::test]
    async fn execute_rejects_empty_id_before_any_io() {
        let channel = ScriptedChannel::replying(Ok(response("x")));
        let use_case = ExecuteToolUseCase::new(channel.clone());

        let err = use_case
            .execute_in(&ToolCall::new("", "read_file"), "/")
            .await
            .unwrap_err();

        assert!(matches!(err, ProtocolError::Validation(_)));
        assert!(channel.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn execute_propagates_timeout() {
        let channel =
            ScriptedChannel::replying(Err(ProtocolError::Timeout("no tool response".into())));
        let use_case = ExecuteToolUseCase::new(channel);

        let err = use_case
            .execute_in(&ToolCall::new("call-1", "slow"), "/")
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }
}
