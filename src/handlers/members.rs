// Team membership handlers

use axum::{
    extract::State,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

use crate::{
    app::AppState,
    middleware::AuthenticatedUser,
    models::{AcceptInviteRequest, InviteMemberRequest, RemoveMemberRequest},
    services::members::MemberListing,
    utils::{ApiError, ApiJson, ApiQuery, ApiResult},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessIdQuery {
    pub business_id: Option<String>,
}

impl BusinessIdQuery {
    pub fn parse(&self) -> ApiResult<Uuid> {
        let raw = self
            .business_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::bad_request("Missing businessId"))?;
        Uuid::parse_str(raw).map_err(|_| ApiError::bad_request("Invalid businessId"))
    }
}

/// GET /api/members/list?businessId=
pub async fn list_members(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiQuery(query): ApiQuery<BusinessIdQuery>,
) -> ApiResult<Json<MemberListing>> {
    let business_id = query.parse()?;
    let listing = state.members.list(&user.uid, business_id).await?;
    Ok(Json(listing))
}

/// POST /api/members/invite
pub async fn invite_member(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<InviteMemberRequest>,
) -> ApiResult<Json<Value>> {
    request.validate()?;

    state
        .members
        .invite(&user.uid, request.business_id, &request.email, request.role)
        .await?;

    Ok(Json(json!({ "ok": true })))
}

/// POST /api/members/accept
pub async fn accept_invite(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<AcceptInviteRequest>,
) -> ApiResult<Json<Value>> {
    let token = request
        .token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing token"))?;

    let role = state
        .members
        .accept(&user.uid, user.email.as_deref(), token)
        .await?;
    Ok(Json(json!({ "ok": true, "role": role })))
}

/// POST /api/members/remove
pub async fn remove_member(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    ApiJson(request): ApiJson<RemoveMemberRequest>,
) -> ApiResult<Json<Value>> {
    state
        .members
        .remove(&user.uid, request.business_id, &request.uid)
        .await?;
    Ok(Json(json!({ "ok": true })))
}
