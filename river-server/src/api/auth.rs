//! Authentication middleware for river-server
//!
//! HTTP Basic: any user name, the server password as the password.

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use river_common::api::auth::{parse_basic_authorization, verify_password, ApiAuthError};
use serde_json::json;
use tracing::debug;

use crate::AppState;

const CHALLENGE: &str = "Basic realm=\"river\"";

/// Authentication middleware
///
/// Applied to protected routes only; `/health` does not use it.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let Some(expected) = state.password.as_deref() else {
        return Ok(next.run(request).await);
    };

    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AuthError(ApiAuthError::MissingCredentials))?
        .to_str()
        .map_err(|e| AuthError(ApiAuthError::MalformedCredentials(e.to_string())))?;

    let provided = parse_basic_authorization(header).map_err(AuthError)?;
    verify_password(&provided, expected).map_err(|e| {
        debug!(uri = %request.uri(), "Rejected credentials");
        AuthError(e)
    })?;

    Ok(next.run(request).await)
}

/// Authentication failure as an HTTP response
#[derive(Debug)]
pub struct AuthError(pub ApiAuthError);

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": {
                "code": "UNAUTHORIZED",
                "message": self.0.to_string(),
            }
        }));

        let mut response = (StatusCode::UNAUTHORIZED, body).into_response();
        response
            .headers_mut()
            .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(CHALLENGE));
        response
    }
}
