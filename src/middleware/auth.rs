use crate::AppState;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: usize,
}

impl Claims {
    /// Key that saved exams and attempts are stored under.
    pub fn owner(&self) -> &str {
        self.email
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .unwrap_or(&self.sub)
    }
}

fn unauthorized(code: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": code }))).into_response()
}

pub fn decode_session(token: &str, secret: &str) -> Option<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .ok()
}

pub async fn require_session(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let Some(auth_header) = req.headers().get(axum::http::header::AUTHORIZATION) else {
        return unauthorized("missing_authorization");
    };
    let Ok(auth_str) = auth_header.to_str() else {
        return unauthorized("bad_authorization");
    };
    let Some(token) = auth_str.strip_prefix("Bearer ") else {
        return unauthorized("unsupported_scheme");
    };

    match decode_session(token.trim(), &state.jwt_secret) {
        Some(claims) => {
            tracing::debug!(user = claims.owner(), "Session accepted");
            req.extensions_mut().insert(claims);
            next.run(req).await
        }
        None => unauthorized("invalid_token"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::token::issue_session_token;

    #[test]
    fn issued_tokens_decode_with_the_same_secret() {
        let token = issue_session_token("secret", "user-1", Some("ann@example.com"), 3600).unwrap();
        let claims = decode_session(&token, "secret").unwrap();
        assert_eq!(claims.owner(), "ann@example.com");
        assert!(decode_session(&token, "other").is_none());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let token = issue_session_token("secret", "user-1", None, -3600).unwrap();
        assert!(decode_session(&token, "secret").is_none());
    }

    #[test]
    fn owner_falls_back_to_subject() {
        let claims = Claims {
            sub: "user-1".into(),
            email: Some(" ".into()),
            exp: 0,
        };
        assert_eq!(claims.owner(), "user-1");
    }
}
