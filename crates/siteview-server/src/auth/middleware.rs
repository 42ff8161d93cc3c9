use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{config::AuthMode, error::AppError, state::AppState};

use super::jwt::decode_jwt;

/// Caller identity injected into request extensions after successful auth.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub subject: String,
}

/// Require a valid `Authorization: Bearer <jwt>` header.
///
/// With `SITEVIEW_AUTH=none` every request passes as `anonymous`.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let secret = match &state.config.auth_mode {
        AuthMode::None => {
            request.extensions_mut().insert(AuthContext {
                subject: "anonymous".to_string(),
            });
            return next.run(request).await;
        }
        AuthMode::Jwt(secret) => secret,
    };

    let claims = {
        let token = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty());
        match token {
            Some(token) => decode_jwt(token, secret),
            None => return AppError::Unauthorized.into_response(),
        }
    };

    match claims {
        Ok(claims) => {
            request.extensions_mut().insert(AuthContext { subject: claims.sub });
            next.run(request).await
        }
        Err(e) => {
            tracing::warn!(error = %e, "Rejected bearer token");
            AppError::Unauthorized.into_response()
        }
    }
}
