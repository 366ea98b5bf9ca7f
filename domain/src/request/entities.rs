//! The working request an orchestration run operates on.

use crate::envelope::entities::Envelope;
use serde::{Deserialize, Serialize};

/// Full request descriptor for one orchestration run.
///
/// A client may replace it wholesale during the bootstrap handshake by
/// sending a `stream_init_request` whose content is this structure as JSON.
/// Provider-specific shaping happens elsewhere; this layer only carries it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversationRequest {
    /// Model identifier understood by the orchestration loop
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// The live user prompt
    pub prompt: String,
    /// Tool definitions in the API's JSON schema shape
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_rounds: Option<u32>,
    /// Prior conversation turns replayed before the live exchange
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<Envelope>,
}

impl ConversationRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<String>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Append replayable turns after any history the request already carries.
    pub fn attach_history(&mut self, turns: impl IntoIterator<Item = Envelope>) {
        self.history.extend(turns);
    }
}
