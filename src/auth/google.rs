//! Google OAuth 2.0 client
//!
//! Implements the authorization-code flow against Google's endpoints and
//! fetches profile data (name, email, photo, birthday) from the People API.
//! The birthday scope seeds the astrology birth profile when granted.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::GoogleArgs;
use crate::types::{AstraError, Result};

const AUTH_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const PEOPLE_ENDPOINT: &str = "https://people.googleapis.com/v1/people/me";

/// Tokens returned by the code exchange
#[derive(Debug, Clone, Deserialize)]
pub struct GoogleTokens {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: String,
}

/// Normalized profile data from the People API
#[derive(Debug, Clone, Serialize)]
pub struct GoogleProfile {
    /// Stable Google account id
    pub sub: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    /// YYYY-MM-DD, or MM-DD when Google withholds the year
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birthday: Option<String>,
}

/// Client for the Google OAuth endpoints
#[derive(Clone)]
pub struct GoogleAuthClient {
    client: Client,
    config: GoogleArgs,
}

impl GoogleAuthClient {
    pub fn new(config: GoogleArgs, timeout_ms: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| AstraError::Config(format!("HTTP client build failed: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Scopes requested on the consent screen
    pub fn scopes(&self) -> Vec<&'static str> {
        let mut scopes = vec![
            "openid",
            "https://www.googleapis.com/auth/userinfo.email",
            "https://www.googleapis.com/auth/userinfo.profile",
        ];
        if self.config.google_enable_birthday_scope {
            scopes.push("https://www.googleapis.com/auth/user.birthday.read");
        }
        scopes
    }

    /// Build the consent-screen URL for a CSRF state value
    pub fn authorization_url(&self, state: &str) -> String {
        let scope = self.scopes().join(" ");
        let mut url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}&access_type={}&prompt={}",
            AUTH_ENDPOINT,
            urlencoding::encode(&self.config.google_client_id),
            urlencoding::encode(&self.config.google_redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(state),
            urlencoding::encode(&self.config.google_access_type),
            urlencoding::encode(&self.config.google_prompt),
        );
        if self.config.google_include_granted_scopes {
            url.push_str("&include_granted_scopes=true");
        }
        url
    }

    /// Exchange an authorization code for tokens
    pub async fn exchange_code(&self, code: &str) -> Result<GoogleTokens> {
        let params = [
            ("code", code),
            ("client_id", self.config.google_client_id.as_str()),
            ("client_secret", self.config.google_client_secret.as_str()),
            ("redirect_uri", self.config.google_redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        debug!("Exchanging authorization code for tokens");
        self.token_request(&params).await
    }

    /// Refresh an expired access token
    pub async fn refresh_access_token(&self, refresh_token: &str) -> Result<GoogleTokens> {
        let params = [
            ("refresh_token", refresh_token),
            ("client_id", self.config.google_client_id.as_str()),
            ("client_secret", self.config.google_client_secret.as_str()),
            ("grant_type", "refresh_token"),
        ];

        debug!("Refreshing access token");
        self.token_request(&params).await
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<GoogleTokens> {
        let response = self
            .client
            .post(TOKEN_ENDPOINT)
            .form(params)
            .send()
            .await
            .map_err(|e| AstraError::GoogleAuth(format!("Token request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AstraError::GoogleAuth(format!(
                "Token endpoint returned {}: {}",
                status, body
            )));
        }

        response
            .json::<GoogleTokens>()
            .await
            .map_err(|e| AstraError::GoogleAuth(format!("Invalid token response: {}", e)))
    }

    /// Fetch the user's profile from the People API
    pub async fn fetch_user_profile(&self, access_token: &str) -> Result<GoogleProfile> {
        let response = self
            .client
            .get(PEOPLE_ENDPOINT)
            .query(&[("personFields", "names,emailAddresses,birthdays,photos")])
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AstraError::GoogleAuth(format!("People API request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AstraError::GoogleAuth(format!(
                "People API returned {}: {}",
                status, body
            )));
        }

        let person: PersonResponse = response
            .json()
            .await
            .map_err(|e| AstraError::GoogleAuth(format!("Invalid People API response: {}", e)))?;

        normalize_person(person)
    }
}

// === People API response shapes (subset) ===

#[derive(Debug, Deserialize)]
struct PersonResponse {
    #[serde(rename = "resourceName", default)]
    resource_name: String,
    #[serde(default)]
    names: Vec<PersonName>,
    #[serde(rename = "emailAddresses", default)]
    email_addresses: Vec<PersonEmail>,
    #[serde(default)]
    birthdays: Vec<PersonBirthday>,
    #[serde(default)]
    photos: Vec<PersonPhoto>,
}

#[derive(Debug, Deserialize)]
struct PersonName {
    #[serde(rename = "displayName", default)]
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct PersonEmail {
    #[serde(default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct PersonBirthday {
    #[serde(default)]
    date: Option<BirthdayDate>,
}

#[derive(Debug, Default, Deserialize)]
struct BirthdayDate {
    #[serde(default)]
    year: Option<u32>,
    #[serde(default)]
    month: Option<u32>,
    #[serde(default)]
    day: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PersonPhoto {
    #[serde(default)]
    url: String,
}

fn normalize_person(person: PersonResponse) -> Result<GoogleProfile> {
    // resourceName is "people/{id}"
    let sub = person
        .resource_name
        .strip_prefix("people/")
        .unwrap_or(&person.resource_name)
        .to_string();
    if sub.is_empty() {
        return Err(AstraError::GoogleAuth(
            "People API response missing resourceName".into(),
        ));
    }

    let email = person
        .email_addresses
        .first()
        .map(|e| e.value.clone())
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AstraError::GoogleAuth("People API response missing email".into()))?;

    let name = person
        .names
        .first()
        .map(|n| n.display_name.clone())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or("User").to_string());

    let picture = person
        .photos
        .first()
        .map(|p| p.url.clone())
        .filter(|u| !u.is_empty());

    let birthday = person
        .birthdays
        .iter()
        .filter_map(|b| b.date.as_ref())
        .map(format_birthday)
        // Prefer a full date over a year-withheld MM-DD
        .max_by_key(|d| d.len());

    if birthday.is_none() {
        warn!("People API returned no usable birthday for {}", sub);
    }

    Ok(GoogleProfile {
        sub,
        name,
        email,
        picture,
        birthday,
    })
}

/// Format a People API date as YYYY-MM-DD, or MM-DD when the year is withheld
fn format_birthday(date: &BirthdayDate) -> String {
    let month = date.month.unwrap_or(1);
    let day = date.day.unwrap_or(1);
    match date.year {
        Some(year) => format!("{:04}-{:02}-{:02}", year, month, day),
        None => format!("{:02}-{:02}", month, day),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(birthday_scope: bool) -> GoogleAuthClient {
        let config = GoogleArgs {
            google_client_id: "client-id".into(),
            google_client_secret: "client-secret".into(),
            google_redirect_uri: "http://localhost:8000/auth/google/callback".into(),
            google_enable_birthday_scope: birthday_scope,
            google_include_granted_scopes: false,
            google_access_type: "offline".into(),
            google_prompt: "consent".into(),
        };
        GoogleAuthClient::new(config, 5000).unwrap()
    }

    #[test]
    fn test_authorization_url_contains_scopes_and_state() {
        let url = client(true).authorization_url("csrf-123");
        assert!(url.starts_with(AUTH_ENDPOINT));
        assert!(url.contains("state=csrf-123"));
        assert!(url.contains("user.birthday.read"));
        assert!(url.contains("access_type=offline"));
    }

    #[test]
    fn test_birthday_scope_can_be_disabled() {
        let url = client(false).authorization_url("csrf-123");
        assert!(!url.contains("user.birthday.read"));
    }

    #[test]
    fn test_format_birthday_full_and_partial() {
        let full = BirthdayDate {
            year: Some(1990),
            month: Some(4),
            day: Some(12),
        };
        assert_eq!(format_birthday(&full), "1990-04-12");

        let partial = BirthdayDate {
            year: None,
            month: Some(4),
            day: Some(12),
        };
        assert_eq!(format_birthday(&partial), "04-12");
    }

    #[test]
    fn test_normalize_person_prefers_full_birthday() {
        let person = PersonResponse {
            resource_name: "people/123".into(),
            names: vec![PersonName {
                display_name: "Ada".into(),
            }],
            email_addresses: vec![PersonEmail {
                value: "ada@example.com".into(),
            }],
            birthdays: vec![
                PersonBirthday {
                    date: Some(BirthdayDate {
                        year: None,
                        month: Some(4),
                        day: Some(12),
                    }),
                },
                PersonBirthday {
                    date: Some(BirthdayDate {
                        year: Some(1990),
                        month: Some(4),
                        day: Some(12),
                    }),
                },
            ],
            photos: vec![],
        };

        let profile = normalize_person(person).unwrap();
        assert_eq!(profile.sub, "123");
        assert_eq!(profile.birthday.as_deref(), Some("1990-04-12"));
    }

    #[test]
    fn test_normalize_person_requires_email() {
        let person = PersonResponse {
            resource_name: "people/123".into(),
            names: vec![],
            email_addresses: vec![],
            birthdays: vec![],
            photos: vec![],
        };
        assert!(normalize_person(person).is_err());
    }
}
