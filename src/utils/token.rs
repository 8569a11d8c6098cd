use crate::error::{Error, Result};
use crate::middleware::auth::Claims;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};

/// Signs an HS256 session token. Sessions are normally minted by the web
/// app's sign-in flow; this is for tooling and tests.
pub fn issue_session_token(
    secret: &str,
    subject: &str,
    email: Option<&str>,
    ttl_seconds: i64,
) -> Result<String> {
    let exp = (Utc::now().timestamp() + ttl_seconds).max(0) as usize;
    let claims = Claims {
        sub: subject.to_string(),
        email: email.map(str::to_string),
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| Error::Internal(format!("Failed to sign session token: {}", e)))
}
