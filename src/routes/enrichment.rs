//! Enrichment task routes
//!
//! - POST /api/enrichment/birth-chart - compute and persist the birth chart
//! - POST /api/enrichment/horoscope   - generate and persist a horoscope
//!
//! Both render a YAML task template, run it on the task runner, wait for the
//! terminal state, and persist the output on the user record. A missing
//! task-runner linkage is an integration error with no partial write.

use bson::{doc, Bson};
use chrono::Utc;
use hyper::{body::Incoming, Request, Response, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::astrology::sun_sign_from_birth_date;
use crate::db::schemas::UserDoc;
use crate::routes::{authenticate_user, error_response, json_response, BoxBody};
use crate::server::AppState;
use crate::types::{AstraError, Result};

#[derive(Debug, Serialize)]
pub struct EnrichmentResponse {
    pub success: bool,
    pub task: &'static str,
    pub result: Value,
}

/// POST /api/enrichment/birth-chart
pub async fn handle_birth_chart(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let (claims, user) = match authenticate_user(&state, &req).await {
        Ok(pair) => pair,
        Err(e) => return error_response(&e),
    };

    match run_birth_chart(&state, &claims.sub, &user).await {
        Ok(result) => json_response(
            StatusCode::OK,
            &EnrichmentResponse {
                success: true,
                task: "birth_chart",
                result,
            },
        ),
        Err(e) => error_response(&e),
    }
}

/// POST /api/enrichment/horoscope
pub async fn handle_horoscope(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let (claims, user) = match authenticate_user(&state, &req).await {
        Ok(pair) => pair,
        Err(e) => return error_response(&e),
    };

    match run_horoscope(&state, &claims.sub, &user).await {
        Ok(result) => json_response(
            StatusCode::OK,
            &EnrichmentResponse {
                success: true,
                task: "horoscope",
                result,
            },
        ),
        Err(e) => error_response(&e),
    }
}

async fn run_birth_chart(
    state: &Arc<AppState>,
    user_id: &str,
    user: &UserDoc,
) -> Result<Value> {
    let julep_user_id = require_linkage(user_id, user)?;

    let birth_date = user
        .birth_date
        .as_deref()
        .ok_or_else(|| AstraError::BadRequest("Birth date is required for a birth chart".into()))?;

    let input = json!({
        "user_id": julep_user_id,
        "birth_date": birth_date,
        "birth_time": user.birth_time,
        "birth_location": user.birth_location,
        "timezone": user.timezone,
        "sun_sign": sun_sign_from_birth_date(birth_date),
    });

    let output = execute_template(state, "birth_chart", &input).await?;

    let chart_doc = to_document(&output)?;
    let oid = parse_user_oid(user_id)?;
    state
        .users()?
        .update_one(
            doc! { "_id": oid },
            doc! { "$set": {
                "birth_chart": chart_doc,
                "metadata.updated_at": bson::DateTime::now(),
            } },
        )
        .await?;

    state.usage.log_enrichment(user_id, "birth_chart").await;
    info!(user = %user_id, "Birth chart computed");

    Ok(output)
}

async fn run_horoscope(state: &Arc<AppState>, user_id: &str, user: &UserDoc) -> Result<Value> {
    let julep_user_id = require_linkage(user_id, user)?;

    let sun_sign = user
        .birth_date
        .as_deref()
        .and_then(sun_sign_from_birth_date);

    let input = json!({
        "user_id": julep_user_id,
        "date": Utc::now().format("%Y-%m-%d").to_string(),
        "sun_sign": sun_sign,
        "birth_chart": user.birth_chart,
    });

    let output = execute_template(state, "horoscope", &input).await?;

    let content = to_document(&output)?;
    let oid = parse_user_oid(user_id)?;
    state
        .users()?
        .update_one(
            doc! { "_id": oid },
            doc! { "$set": {
                "horoscope": {
                    "generated_at": bson::DateTime::now(),
                    "content": content,
                },
                "metadata.updated_at": bson::DateTime::now(),
            } },
        )
        .await?;

    state.usage.log_enrichment(user_id, "horoscope").await;
    info!(user = %user_id, "Horoscope generated");

    Ok(output)
}

/// Render a task template, execute it, and wait for the output
async fn execute_template(state: &Arc<AppState>, name: &str, input: &Value) -> Result<Value> {
    let template = state.templates.get(name)?;
    let definition = template.as_json()?;

    let task = state
        .julep
        .create_task(&state.args.julep.julep_agent_id, &definition)
        .await?;
    let execution = state.julep.execute_task(&task.id, input).await?;
    let finished = state.julep.wait_for_execution(&execution.id).await?;

    finished
        .output
        .ok_or_else(|| AstraError::Julep(format!("Execution {} produced no output", finished.id)))
}

fn require_linkage<'a>(user_id: &str, user: &'a UserDoc) -> Result<&'a str> {
    user.julep_user_id
        .as_deref()
        .ok_or_else(|| AstraError::UnlinkedAccount(user_id.to_string()))
}

fn parse_user_oid(user_id: &str) -> Result<bson::oid::ObjectId> {
    bson::oid::ObjectId::parse_str(user_id)
        .map_err(|_| AstraError::NotFound(format!("Unknown user {}", user_id)))
}

/// Task outputs are arbitrary JSON; wrap non-object outputs for storage
fn to_document(output: &Value) -> Result<bson::Document> {
    let bson_value =
        bson::to_bson(output).map_err(|e| AstraError::Internal(format!("BSON error: {}", e)))?;
    Ok(match bson_value {
        Bson::Document(doc) => doc,
        other => doc! { "result": other },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_document_wraps_scalars() {
        let doc = to_document(&json!("just a string")).unwrap();
        assert_eq!(doc.get_str("result").unwrap(), "just a string");
    }

    #[test]
    fn test_to_document_keeps_objects() {
        let doc = to_document(&json!({ "sun": "Aries", "houses": [1, 2] })).unwrap();
        assert_eq!(doc.get_str("sun").unwrap(), "Aries");
    }

    #[test]
    fn test_require_linkage() {
        let mut user = UserDoc::new("sub".into(), "a@b.c".into(), "A".into());
        assert!(require_linkage("u1", &user).is_err());
        user.julep_user_id = Some("julep-1".into());
        assert_eq!(require_linkage("u1", &user).unwrap(), "julep-1");
    }
}
