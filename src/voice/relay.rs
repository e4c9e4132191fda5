//! Voice session WebSocket relay
//!
//! Bidirectional relay between the browser and the ElevenLabs conversational
//! endpoint. Dials the signed URL, sends the session initiation payload, then
//! pumps frames both ways. Upstream `ping` events are answered locally with
//! `pong`; everything else is forwarded verbatim. The session state machine
//! and its abort signal drive teardown.

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::Arc;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, warn};

use crate::types::{AstraError, Result};
use crate::voice::session::{VoiceSession, VoiceSessionState};

type HyperWebSocket =
    hyper_tungstenite::WebSocketStream<hyper_util::rt::TokioIo<hyper::upgrade::Upgraded>>;

/// Run the relay until either side closes or the session is aborted
pub async fn run_relay(
    browser_ws: HyperWebSocket,
    signed_url: &str,
    initiation: Value,
    session: Arc<VoiceSession>,
) -> Result<()> {
    session.transition(VoiceSessionState::Connecting)?;

    let (upstream_ws, _) = match connect_async(signed_url).await {
        Ok(pair) => pair,
        Err(e) => {
            // Dial failed: tear the session down before reporting
            let _ = session.transition(VoiceSessionState::Ending);
            let _ = session.transition(VoiceSessionState::Closed);
            return Err(AstraError::ElevenLabs(format!(
                "Failed to connect to agent endpoint: {}",
                e
            )));
        }
    };

    info!("Voice relay connected to agent endpoint");

    let (mut upstream_sink, mut upstream_stream) = upstream_ws.split();
    let (mut browser_sink, mut browser_stream) = browser_ws.split();

    // First client message: prompt override + dynamic variables
    let init_text = serde_json::to_string(&initiation)
        .map_err(|e| AstraError::Internal(format!("Initiation payload serialization: {}", e)))?;
    upstream_sink
        .send(Message::Text(init_text))
        .await
        .map_err(|e| AstraError::ElevenLabs(format!("Failed to send initiation: {}", e)))?;

    session.transition(VoiceSessionState::Connected)?;

    let mut abort = session.abort_signal();

    loop {
        tokio::select! {
            // Browser -> upstream
            msg = browser_stream.next() => {
                match msg {
                    Some(Ok(Message::Close(frame))) => {
                        debug!("Browser closed voice session");
                        let _ = upstream_sink.send(Message::Close(frame)).await;
                        break;
                    }
                    Some(Ok(msg)) => {
                        if let Err(e) = upstream_sink.send(msg).await {
                            error!("Failed to forward to agent endpoint: {}", e);
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!("Browser socket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }

            // Upstream -> browser
            msg = upstream_stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(pong) = ping_reply(&text) {
                            if let Err(e) = upstream_sink.send(Message::Text(pong)).await {
                                error!("Failed to answer agent ping: {}", e);
                                break;
                            }
                            continue;
                        }
                        if let Err(e) = browser_sink.send(Message::Text(text)).await {
                            error!("Failed to forward to browser: {}", e);
                            break;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!("Agent endpoint closed voice session");
                        let _ = browser_sink.send(Message::Close(frame)).await;
                        break;
                    }
                    Some(Ok(msg)) => {
                        if let Err(e) = browser_sink.send(msg).await {
                            error!("Failed to forward to browser: {}", e);
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        warn!("Agent socket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }

            // Abort signal
            _ = abort.changed() => {
                if session.is_aborted() {
                    info!("Voice session aborted");
                    let _ = upstream_sink.send(Message::Close(None)).await;
                    let _ = browser_sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    }

    if session.state().is_live() {
        session.transition(VoiceSessionState::Ending)?;
    }
    session.transition(VoiceSessionState::Closed)?;
    info!("Voice relay closed");

    Ok(())
}

/// Build a local pong reply for an agent `ping` event, if the frame is one
fn ping_reply(text: &str) -> Option<String> {
    let value: Value = serde_json::from_str(text).ok()?;
    if value.get("type").and_then(Value::as_str) != Some("ping") {
        return None;
    }
    let event_id = value
        .get("ping_event")
        .and_then(|e| e.get("event_id"))
        .cloned()
        .unwrap_or(Value::Null);
    Some(
        serde_json::json!({
            "type": "pong",
            "event_id": event_id,
        })
        .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_reply_carries_event_id() {
        let frame = r#"{"type":"ping","ping_event":{"event_id":42}}"#;
        let pong = ping_reply(frame).unwrap();
        let value: Value = serde_json::from_str(&pong).unwrap();
        assert_eq!(value["type"], "pong");
        assert_eq!(value["event_id"], 42);
    }

    #[test]
    fn test_non_ping_frames_are_not_answered() {
        assert!(ping_reply(r#"{"type":"agent_response"}"#).is_none());
        assert!(ping_reply("not json").is_none());
    }
}
