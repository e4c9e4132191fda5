//! User profile routes
//!
//! - GET   /api/users/me - profile with birth data and chart completion
//! - PATCH /api/users/me - update birth profile fields

use bson::doc;
use hyper::{body::Incoming, Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::gamification::chart_completion_percent;
use crate::routes::{
    authenticate_user, error_response, json_response, parse_json_body, BoxBody,
};
use crate::server::AppState;
use crate::types::AstraError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub user_id: String,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    pub chart_completion_percent: u8,
    pub julep_linked: bool,
    pub has_birth_chart: bool,
    pub has_horoscope: bool,
}

/// Birth profile fields accepted on PATCH; absent fields are left unchanged
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub birth_date: Option<String>,
    pub birth_time: Option<String>,
    pub birth_location: Option<String>,
    pub timezone: Option<String>,
}

fn profile_response(user_id: String, user: &crate::db::schemas::UserDoc) -> ProfileResponse {
    ProfileResponse {
        user_id,
        email: user.email.clone(),
        display_name: user.display_name.clone(),
        picture: user.picture.clone(),
        birth_date: user.birth_date.clone(),
        birth_time: user.birth_time.clone(),
        birth_location: user.birth_location.clone(),
        timezone: user.timezone.clone(),
        chart_completion_percent: chart_completion_percent(user.birth_profile_flags()),
        julep_linked: user.julep_user_id.is_some(),
        has_birth_chart: user.birth_chart.is_some(),
        has_horoscope: user.horoscope.is_some(),
    }
}

/// GET /api/users/me
pub async fn handle_me_get(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let (claims, user) = match authenticate_user(&state, &req).await {
        Ok(pair) => pair,
        Err(e) => return error_response(&e),
    };

    json_response(StatusCode::OK, &profile_response(claims.sub, &user))
}

/// PATCH /api/users/me
pub async fn handle_me_update(req: Request<Incoming>, state: Arc<AppState>) -> Response<BoxBody> {
    let (claims, _) = match authenticate_user(&state, &req).await {
        Ok(pair) => pair,
        Err(e) => return error_response(&e),
    };

    let update: ProfileUpdate = match parse_json_body(req).await {
        Ok(u) => u,
        Err(e) => return error_response(&e),
    };

    let mut set = doc! { "metadata.updated_at": bson::DateTime::now() };
    if let Some(birth_date) = update.birth_date {
        set.insert("birth_date", birth_date);
    }
    if let Some(birth_time) = update.birth_time {
        set.insert("birth_time", birth_time);
    }
    if let Some(birth_location) = update.birth_location {
        set.insert("birth_location", birth_location);
    }
    if let Some(timezone) = update.timezone {
        set.insert("timezone", timezone);
    }

    if set.len() == 1 {
        return error_response(&AstraError::BadRequest(
            "No birth profile fields to update".into(),
        ));
    }

    let users = match state.users() {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };

    let oid = match bson::oid::ObjectId::parse_str(&claims.sub) {
        Ok(oid) => oid,
        Err(_) => return error_response(&AstraError::NotFound("Unknown user".into())),
    };

    if let Err(e) = users
        .update_one(doc! { "_id": oid }, doc! { "$set": set })
        .await
    {
        return error_response(&e);
    }

    let user = match users.find_one(doc! { "_id": oid }).await {
        Ok(Some(u)) => u,
        Ok(None) => return error_response(&AstraError::NotFound("Unknown user".into())),
        Err(e) => return error_response(&e),
    };

    json_response(StatusCode::OK, &profile_response(claims.sub, &user))
}
