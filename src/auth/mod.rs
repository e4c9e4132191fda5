//! Authentication for Astra
//!
//! Provides:
//! - Google OAuth 2.0 authorization-code flow and People API profile fetch
//! - JWT session token generation and validation

pub mod google;
pub mod jwt;

pub use google::{GoogleAuthClient, GoogleProfile, GoogleTokens};
pub use jwt::{extract_token_from_header, Claims, JwtValidator};
