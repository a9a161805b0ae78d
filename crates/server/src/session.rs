//! Browser session: the current file selection and subtitle delay, kept
//! client-side in a cookie signed with `SECRET_KEY`.

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use reelcast_core::error::ApiError;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const SESSION_COOKIE: &str = "reelcast_session";

const SESSION_DAYS: i64 = 30;

/// What the user picked in the browser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub video: Option<String>,
    pub subtitle: Option<String>,
    pub delay: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(flatten)]
    selection: Selection,
    exp: usize,
}

/// Sign a selection into a token.
pub fn encode_selection(selection: &Selection, secret: &str) -> Result<String, ApiError> {
    let exp = chrono::Utc::now()
        .checked_add_signed(chrono::Duration::days(SESSION_DAYS))
        .ok_or_else(|| ApiError::Internal("time overflow".into()))?
        .timestamp() as usize;

    let claims = Claims {
        selection: selection.clone(),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(format!("session encoding failed: {e}")))
}

/// Verify a token. Tampered or expired tokens yield `None`.
pub fn decode_selection(token: &str, secret: &str) -> Option<Selection> {
    match decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    ) {
        Ok(data) => Some(data.claims.selection),
        Err(e) => {
            debug!(error = %e, "discarding invalid session cookie");
            None
        }
    }
}

/// Current selection, empty when there is no valid cookie.
pub fn read(jar: &CookieJar, secret: &str) -> Selection {
    jar.get(SESSION_COOKIE)
        .and_then(|c| decode_selection(c.value(), secret))
        .unwrap_or_default()
}

/// Store a selection in the jar.
pub fn write(jar: CookieJar, selection: &Selection, secret: &str) -> Result<CookieJar, ApiError> {
    let token = encode_selection(selection, secret)?;
    let cookie = Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();
    Ok(jar.add(cookie))
}
