//! Admin details endpoint.
//!
//! Answers 404 unless an admin token is configured, and requires that token
//! as a bearer credential. The stored password is never part of the response.

use crate::{
    config::Secret,
    errors::{AppError, CatalogError, CatalogResult},
    models::admin::AdminDetails,
    state::AppState,
};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header},
};
use hmac::{Hmac, Mac};
use sha1::Sha1;

/// GET `/api/admin/details`
pub async fn get_admin_details(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AdminDetails>, AppError> {
    let Some(expected) = state.admin_token.as_ref() else {
        return Err(AppError::not_found("Not found"));
    };
    authorize(expected, &headers).map_err(|e| e.into_app_error("Failed to fetch admin details"))?;

    let details = state
        .stamps
        .admin_details()
        .await
        .map_err(|e| e.into_app_error("Failed to fetch admin details"))?;

    details
        .map(Json)
        .ok_or_else(|| AppError::not_found("Admin details not found"))
}

fn authorize(expected: &Secret, headers: &HeaderMap) -> CatalogResult<()> {
    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("Bearer"))
        .map(|(_, token)| token.trim());

    match provided {
        Some(token) if token_matches(expected, token) => Ok(()),
        _ => Err(CatalogError::Unauthorized),
    }
}

/// Compare tokens through their HMAC tags so the check takes the same time
/// wherever the first differing byte is.
fn token_matches(expected: &Secret, provided: &str) -> bool {
    let key = expected.expose().as_bytes();
    let tag = |msg: &[u8]| {
        Hmac::<Sha1>::new_from_slice(key).map(|mut mac| {
            mac.update(msg);
            mac
        })
    };

    match (tag(key), tag(provided.as_bytes())) {
        (Ok(expected_mac), Ok(provided_mac)) => provided_mac
            .verify_slice(&expected_mac.finalize().into_bytes())
            .is_ok(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_must_match() {
        let expected = Secret::new("letmein");
        let mut headers = HeaderMap::new();
        assert!(authorize(&expected, &headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer nope"));
        assert!(authorize(&expected, &headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("letmein"));
        assert!(authorize(&expected, &headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer letmein"));
        assert!(authorize(&expected, &headers).is_ok());
    }

    #[test]
    fn bearer_scheme_is_case_insensitive() {
        let expected = Secret::new("letmein");
        let mut headers = HeaderMap::new();
        for value in ["bearer letmein", "BEARER letmein", "Bearer   letmein "] {
            headers.insert(header::AUTHORIZATION, HeaderValue::from_static(value));
            assert!(authorize(&expected, &headers).is_ok(), "{value}");
        }

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic letmein"));
        assert!(authorize(&expected, &headers).is_err());
    }

    #[test]
    fn token_comparison_rejects_prefixes_and_extensions() {
        let expected = Secret::new("letmein");
        assert!(token_matches(&expected, "letmein"));
        assert!(!token_matches(&expected, "letme"));
        assert!(!token_matches(&expected, "letmein2"));
        assert!(!token_matches(&expected, ""));
    }
}
