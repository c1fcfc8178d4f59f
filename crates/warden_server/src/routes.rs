//! HTTP handlers.

use axum::extract::{FromRequest, FromRequestParts, Path, State};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::debug;
use utoipa::ToSchema;
use warden_db::{Principal, PrincipalStatus};

use crate::error::{ApiError, ErrorBody};
use crate::state::AppState;

/// Token taken from an `Authorization: Bearer <token>` header.
///
/// A missing or malformed header is rejected the same way as a bad token.
#[derive(Debug)]
pub struct BearerToken(pub String);

impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthorized)?;

        match value.split_once(' ') {
            Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => {
                let token = token.trim();
                if token.is_empty() {
                    Err(ApiError::Unauthorized)
                } else {
                    Ok(Self(token.to_string()))
                }
            }
            _ => Err(ApiError::Unauthorized),
        }
    }
}

/// Caller presented the configured admin token.
///
/// With no admin token configured every request is unauthorized.
#[derive(Debug)]
pub struct AdminAccess;

impl FromRequestParts<AppState> for AdminAccess {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let BearerToken(presented) = BearerToken::from_request_parts(parts, state).await?;
        match state.config.admin_token.as_deref() {
            // Compare digests so the comparison length never depends on the secret
            Some(expected)
                if Sha256::digest(expected.as_bytes()) == Sha256::digest(presented.as_bytes()) =>
            {
                Ok(Self)
            }
            _ => {
                debug!("Rejected admin request");
                Err(ApiError::Unauthorized)
            }
        }
    }
}

/// `Json` whose rejections use the API's error body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub login: String,
    pub secret: String,
}

/// Changes to apply to a principal. At least one field must be set.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PrincipalUpdate {
    #[schema(value_type = Option<String>, example = "disabled")]
    pub status: Option<PrincipalStatus>,
    /// Replaces the active secret; the old one is kept as superseded
    pub secret: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PrincipalBody {
    pub id: String,
    pub login: String,
    #[schema(value_type = String, example = "active")]
    pub status: PrincipalStatus,
}

impl From<Principal> for PrincipalBody {
    fn from(p: Principal) -> Self {
        Self {
            id: p.id,
            login: p.login,
            status: p.status,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IssuedBody {
    pub token: String,
    pub principal_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionBody {
    pub principal_id: String,
    pub login: String,
    pub expires_at: DateTime<Utc>,
}

/// Store liveness
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Store reachable"),
        (status = 503, description = "Store unavailable", body = ErrorBody),
    )
)]
pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state.db().health_check().await?;
    Ok(Json(json!({ "status": "ok" })))
}

/// Register a principal
///
/// Fails with 409 if the login is taken.
#[utoipa::path(
    post,
    path = "/v1/principals",
    request_body = LoginRequest,
    responses(
        (status = 201, description = "Principal created", body = PrincipalBody),
        (status = 400, description = "Empty login or secret", body = ErrorBody),
        (status = 409, description = "Login taken", body = ErrorBody),
    )
)]
pub async fn create_principal(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<(StatusCode, Json<PrincipalBody>), ApiError> {
    let principal = state.auth.register(&req.login, &req.secret).await?;
    Ok((StatusCode::CREATED, Json(principal.into())))
}

#[utoipa::path(
    get,
    path = "/v1/principals/{login}",
    params(("login" = String, Path, description = "Login name")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Principal found", body = PrincipalBody),
        (status = 401, description = "Missing or wrong admin token", body = ErrorBody),
        (status = 404, description = "No such login", body = ErrorBody),
    )
)]
pub async fn get_principal(
    State(state): State<AppState>,
    _admin: AdminAccess,
    Path(login): Path<String>,
) -> Result<Json<PrincipalBody>, ApiError> {
    let principal = state.auth.principal(&login).await?;
    Ok(Json(principal.into()))
}

/// Change a principal's status or secret
///
/// Disabling a principal also invalidates its outstanding tokens.
#[utoipa::path(
    put,
    path = "/v1/principals/{login}",
    params(("login" = String, Path, description = "Login name")),
    request_body = PrincipalUpdate,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Principal updated", body = PrincipalBody),
        (status = 400, description = "Nothing to update", body = ErrorBody),
        (status = 401, description = "Missing or wrong admin token", body = ErrorBody),
        (status = 404, description = "No such login", body = ErrorBody),
        (status = 409, description = "Concurrent secret change", body = ErrorBody),
    )
)]
pub async fn update_principal(
    State(state): State<AppState>,
    _admin: AdminAccess,
    Path(login): Path<String>,
    JsonBody(req): JsonBody<PrincipalUpdate>,
) -> Result<Json<PrincipalBody>, ApiError> {
    if req.status.is_none() && req.secret.is_none() {
        return Err(ApiError::BadRequest(
            "expected at least one of status, secret".to_string(),
        ));
    }

    let mut principal = state.auth.principal(&login).await?;
    if let Some(secret) = req.secret {
        state.auth.change_secret(&principal.id, &secret).await?;
    }
    if let Some(status) = req.status {
        principal = match status {
            PrincipalStatus::Active => state.auth.enable(&login).await?,
            PrincipalStatus::Disabled => state.auth.disable(&login).await?,
        };
    }
    Ok(Json(principal.into()))
}

/// Log in
#[utoipa::path(
    post,
    path = "/v1/sessions",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = IssuedBody),
        (status = 401, description = "Invalid credentials", body = ErrorBody),
        (status = 503, description = "Store unavailable", body = ErrorBody),
    )
)]
pub async fn create_session(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<IssuedBody>, ApiError> {
    let issued = state.auth.authenticate(&req.login, &req.secret).await?;
    Ok(Json(IssuedBody {
        token: issued.token,
        principal_id: issued.principal_id,
        expires_at: issued.expires_at,
    }))
}

#[utoipa::path(
    get,
    path = "/v1/sessions/current",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Token is valid", body = SessionBody),
        (status = 401, description = "Unknown, expired or revoked token", body = ErrorBody),
    )
)]
pub async fn current_session(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<Json<SessionBody>, ApiError> {
    let session = state.auth.session(&token).await?;
    Ok(Json(SessionBody {
        principal_id: session.principal.id,
        login: session.principal.login,
        expires_at: session.expires_at,
    }))
}

/// Log out
///
/// Ending an already ended session succeeds.
#[utoipa::path(
    delete,
    path = "/v1/sessions/current",
    security(("bearer" = [])),
    responses(
        (status = 204, description = "Token revoked"),
        (status = 401, description = "Unknown token", body = ErrorBody),
    )
)]
pub async fn end_session(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> Result<StatusCode, ApiError> {
    state.auth.revoke(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}
