//! Astra - gateway for the astrology companion backend
//!
//! Astra authenticates users via Google OAuth, stores profiles and astrology
//! data in MongoDB, and orchestrates two external platforms: the Julep task
//! runner (birth-chart calculation, horoscope generation) and the ElevenLabs
//! conversational voice agent (live browser sessions over WebSocket).
//!
//! ## Services
//!
//! - **Auth**: Google OAuth 2.0 flow, People API profile fetch, JWT sessions
//! - **Profiles**: birth data, enrichment results, recent conversation cache
//! - **Gamification**: consecutive-day streaks, permanent milestones
//! - **Enrichment**: task-runner executions from YAML task templates
//! - **Voice**: signed session URLs and a WebSocket relay with an explicit
//!   session state machine

pub mod astrology;
pub mod auth;
pub mod config;
pub mod db;
pub mod gamification;
pub mod logging;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;
pub mod voice;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{AstraError, Result};
