//! Authentication middleware
//!
//! Extracts and validates JWT tokens from requests.

use crate::auth::{decode_token, Claims, Role};
use crate::error::AppError;
use axum::http::header::AUTHORIZATION;
use axum::{extract::Request, middleware::Next, response::Response};

/// Extract claims from request
pub async fn auth_middleware(mut request: Request, next: Next) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization format".to_string()))?;

    let claims = decode_token(token)?;

    // Insert claims into request extensions for handlers to use
    request.extensions_mut().insert(claims);

    Ok(next.run(request).await)
}

/// Authorization policy: the acting user's role must be in `allowed`.
///
/// Returns 403 on mismatch; handlers call this explicitly before any
/// mutating work.
pub fn require_role(claims: &Claims, allowed: &[Role]) -> Result<(), AppError> {
    if !allowed.contains(&claims.role) {
        return Err(AppError::Forbidden(format!(
            "Requires one of [{}], you have {}",
            allowed
                .iter()
                .map(|r| r.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            claims.role
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims_with_role(role: Role) -> Claims {
        Claims {
            sub: 1,
            username: "tester".to_string(),
            role,
            jti: "test-token".to_string(),
            exp: 0,
            iat: 0,
        }
    }

    #[test]
    fn matching_role_is_allowed() {
        let claims = claims_with_role(Role::BusinessOwner);
        assert!(require_role(&claims, &[Role::BusinessOwner]).is_ok());
    }

    #[test]
    fn mismatched_role_is_forbidden() {
        let claims = claims_with_role(Role::Viewer);
        let err = require_role(&claims, &[Role::OpsAnalyst]).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }
}
