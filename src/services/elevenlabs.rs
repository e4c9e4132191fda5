//! ElevenLabs conversational AI client
//!
//! Fetches signed session URLs for the configured agent and builds the
//! session initiation payload (prompt override, dynamic variables, TTS
//! voice). The live WebSocket relay lives in the `voice` module.

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use crate::config::ElevenLabsArgs;
use crate::types::{AstraError, Result};

/// Client for the ElevenLabs REST API
#[derive(Clone)]
pub struct ElevenLabsClient {
    client: Client,
    config: ElevenLabsArgs,
}

#[derive(Debug, Deserialize)]
struct SignedUrlResponse {
    signed_url: String,
}

impl ElevenLabsClient {
    pub fn new(config: ElevenLabsArgs, timeout_ms: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| AstraError::Config(format!("HTTP client build failed: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Fetch a pre-authenticated WSS URL for one agent session
    pub async fn get_signed_url(&self) -> Result<String> {
        if self.config.elevenlabs_agent_id.is_empty() {
            return Err(AstraError::Config("ELEVENLABS_AGENT_ID is not set".into()));
        }

        let url = format!(
            "{}/v1/convai/conversation/get_signed_url",
            self.config.elevenlabs_base_url.trim_end_matches('/')
        );

        debug!(agent = %self.config.elevenlabs_agent_id, "Fetching signed session URL");

        let response = self
            .client
            .get(&url)
            .query(&[("agent_id", self.config.elevenlabs_agent_id.as_str())])
            .header("xi-api-key", &self.config.elevenlabs_api_key)
            .send()
            .await
            .map_err(|e| AstraError::ElevenLabs(format!("Signed URL request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AstraError::ElevenLabs(format!(
                "Signed URL endpoint returned {}: {}",
                status, body
            )));
        }

        let signed: SignedUrlResponse = response
            .json()
            .await
            .map_err(|e| AstraError::ElevenLabs(format!("Invalid signed URL response: {}", e)))?;

        Ok(signed.signed_url)
    }

    /// Session initiation payload sent as the first client message.
    ///
    /// Overrides the agent prompt with the rendered responder template and
    /// injects per-user dynamic variables; values are stringified the way the
    /// agent expects.
    pub fn initiation_payload(
        &self,
        rendered_prompt: &str,
        dynamic_variables: &HashMap<String, String>,
    ) -> Value {
        let mut agent = json!({
            "prompt": { "prompt": rendered_prompt },
            "language": self.config.elevenlabs_language,
        });

        let mut overrides = json!({ "agent": agent.take() });
        if let Some(ref voice_id) = self.config.elevenlabs_voice_id {
            overrides["tts"] = json!({ "voice_id": voice_id });
        }

        json!({
            "type": "conversation_initiation_client_data",
            "conversation_config_override": overrides,
            "dynamic_variables": dynamic_variables,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(voice: Option<&str>) -> ElevenLabsArgs {
        ElevenLabsArgs {
            elevenlabs_api_key: "key".into(),
            elevenlabs_base_url: "https://api.elevenlabs.io".into(),
            elevenlabs_agent_id: "agent-1".into(),
            elevenlabs_voice_id: voice.map(String::from),
            elevenlabs_language: "en".into(),
        }
    }

    #[test]
    fn test_initiation_payload_shape() {
        let client = ElevenLabsClient::new(config(Some("voice-9")), 5000).unwrap();
        let mut vars = HashMap::new();
        vars.insert("display_name".to_string(), "Ada".to_string());

        let payload = client.initiation_payload("You are Astra.", &vars);

        assert_eq!(payload["type"], "conversation_initiation_client_data");
        assert_eq!(
            payload["conversation_config_override"]["agent"]["prompt"]["prompt"],
            "You are Astra."
        );
        assert_eq!(
            payload["conversation_config_override"]["tts"]["voice_id"],
            "voice-9"
        );
        assert_eq!(payload["dynamic_variables"]["display_name"], "Ada");
    }

    #[test]
    fn test_initiation_payload_without_voice_override() {
        let client = ElevenLabsClient::new(config(None), 5000).unwrap();
        let payload = client.initiation_payload("prompt", &HashMap::new());
        assert!(payload["conversation_config_override"]["tts"].is_null());
    }
}
