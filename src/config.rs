//! Configuration for Astra
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Astra - gateway for the astrology companion backend
#[derive(Parser, Debug, Clone)]
#[command(name = "astra")]
#[command(about = "Auth, enrichment-task, and voice-session gateway for Astra")]
pub struct Args {
    /// Unique node identifier for this gateway instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8000")]
    pub listen: SocketAddr,

    /// Enable development mode (relaxed auth requirements, verbose errors)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "astra")]
    pub mongodb_db: String,

    /// JWT secret for session token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT session token expiry in seconds (default 7 days)
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "604800")]
    pub jwt_expiry_seconds: u64,

    /// Google OAuth configuration
    #[command(flatten)]
    pub google: GoogleArgs,

    /// Julep task-runner configuration
    #[command(flatten)]
    pub julep: JulepArgs,

    /// ElevenLabs voice configuration
    #[command(flatten)]
    pub elevenlabs: ElevenLabsArgs,

    /// Directory holding YAML task definition templates
    #[arg(long, env = "TASK_TEMPLATE_DIR", default_value = "tasks")]
    pub task_template_dir: String,

    /// Path to the responder prompt template (markdown with {{var}} placeholders)
    #[arg(long, env = "RESPONDER_TEMPLATE_PATH", default_value = "prompts/responder.md")]
    pub responder_template_path: String,

    /// Frontend base URL (OAuth callback redirects land here)
    #[arg(long, env = "FRONTEND_URL", default_value = "http://localhost:3000")]
    pub frontend_url: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Outbound request timeout in milliseconds
    #[arg(long, env = "REQUEST_TIMEOUT_MS", default_value = "30000")]
    pub request_timeout_ms: u64,

    /// How many recent conversation summaries to cache on the user record
    #[arg(long, env = "RECENT_CONVERSATION_LIMIT", default_value = "10")]
    pub recent_conversation_limit: usize,

    /// Optional JSONL usage log path (auth, voice, milestone events)
    #[arg(long, env = "USAGE_LOG_PATH")]
    pub usage_log_path: Option<String>,
}

/// Google OAuth 2.0 configuration
#[derive(Parser, Debug, Clone)]
pub struct GoogleArgs {
    /// OAuth client ID
    #[arg(long, env = "GOOGLE_CLIENT_ID", default_value = "")]
    pub google_client_id: String,

    /// OAuth client secret
    #[arg(long, env = "GOOGLE_CLIENT_SECRET", default_value = "")]
    pub google_client_secret: String,

    /// Redirect URI registered with the OAuth consent screen
    #[arg(
        long,
        env = "GOOGLE_REDIRECT_URI",
        default_value = "http://localhost:8000/auth/google/callback"
    )]
    pub google_redirect_uri: String,

    /// Request the People API birthday scope (seeds the birth profile)
    #[arg(long, env = "GOOGLE_ENABLE_BIRTHDAY_SCOPE", default_value = "true")]
    pub google_enable_birthday_scope: bool,

    /// Pass include_granted_scopes=true on the consent URL
    #[arg(long, env = "GOOGLE_INCLUDE_GRANTED_SCOPES", default_value = "false")]
    pub google_include_granted_scopes: bool,

    /// access_type parameter (offline to receive refresh tokens)
    #[arg(long, env = "GOOGLE_ACCESS_TYPE", default_value = "offline")]
    pub google_access_type: String,

    /// prompt parameter (consent forces the consent screen)
    #[arg(long, env = "GOOGLE_PROMPT", default_value = "consent")]
    pub google_prompt: String,
}

/// Julep task-runner configuration
#[derive(Parser, Debug, Clone)]
pub struct JulepArgs {
    /// Julep API key
    #[arg(long, env = "JULEP_API_KEY", default_value = "")]
    pub julep_api_key: String,

    /// Julep API base URL
    #[arg(long, env = "JULEP_BASE_URL", default_value = "https://api.julep.ai/api")]
    pub julep_base_url: String,

    /// Julep agent ID used for enrichment sessions
    #[arg(long, env = "JULEP_AGENT_ID", default_value = "")]
    pub julep_agent_id: String,
}

/// ElevenLabs conversational AI configuration
#[derive(Parser, Debug, Clone)]
pub struct ElevenLabsArgs {
    /// ElevenLabs API key
    #[arg(long, env = "ELEVENLABS_API_KEY", default_value = "")]
    pub elevenlabs_api_key: String,

    /// ElevenLabs API base URL
    #[arg(long, env = "ELEVENLABS_BASE_URL", default_value = "https://api.elevenlabs.io")]
    pub elevenlabs_base_url: String,

    /// Conversational agent ID
    #[arg(long, env = "ELEVENLABS_AGENT_ID", default_value = "")]
    pub elevenlabs_agent_id: String,

    /// TTS voice override (optional)
    #[arg(long, env = "ELEVENLABS_VOICE_ID")]
    pub elevenlabs_voice_id: Option<String>,

    /// Agent language code
    #[arg(long, env = "ELEVENLABS_LANGUAGE", default_value = "en")]
    pub elevenlabs_language: String,
}

impl Args {
    /// Get effective JWT secret (uses default in dev mode)
    pub fn jwt_secret(&self) -> String {
        if self.dev_mode {
            self.jwt_secret
                .clone()
                .unwrap_or_else(|| "dev-only-insecure-secret".to_string())
        } else {
            self.jwt_secret
                .clone()
                .expect("JWT_SECRET is required in production mode")
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if !self.dev_mode {
            if self.jwt_secret.is_none() {
                return Err("JWT_SECRET is required in production mode".to_string());
            }
            if self.google.google_client_id.is_empty() || self.google.google_client_secret.is_empty() {
                return Err(
                    "GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET are required in production mode"
                        .to_string(),
                );
            }
        }

        if self.recent_conversation_limit == 0 {
            return Err("RECENT_CONVERSATION_LIMIT must be at least 1".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev_args() -> Args {
        Args::parse_from(["astra", "--dev-mode"])
    }

    #[test]
    fn test_dev_mode_defaults_validate() {
        let args = dev_args();
        assert!(args.validate().is_ok());
        assert_eq!(args.jwt_secret(), "dev-only-insecure-secret");
    }

    #[test]
    fn test_production_requires_secrets() {
        let args = Args::parse_from(["astra"]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_recent_conversation_limit_floor() {
        let args = Args::parse_from(["astra", "--dev-mode", "--recent-conversation-limit", "0"]);
        assert!(args.validate().is_err());
    }
}
