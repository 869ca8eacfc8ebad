//! Authentication middleware
//!
//! Identity comes from a bearer JWT issued by the company's identity
//! provider: `sub` is the username, `stores` the stores the user may order
//! for, and `role` decides whether the user may approve orders.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use shared::StoreCode;

use crate::error::{AppError, ErrorDetail, ErrorResponse};
use crate::AppState;

/// Access level carried in the token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Approver,
    Admin,
}

impl Role {
    pub fn can_approve(&self) -> bool {
        matches!(self, Role::Approver | Role::Admin)
    }
}

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub username: String,
    pub stores: Vec<StoreCode>,
    pub role: Role,
}

impl AuthUser {
    pub fn can_approve(&self) -> bool {
        self.role.can_approve()
    }

    /// Guard for approval endpoints
    pub fn require_approver(&self) -> Result<(), AppError> {
        if self.can_approve() {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "user {} may not approve orders",
                self.username
            )))
        }
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub stores: Vec<String>,
    pub role: Role,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    /// Claims valid from now for `ttl_seconds`
    pub fn new(username: &str, stores: &[&str], role: Role, ttl_seconds: i64) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: username.to_string(),
            stores: stores.iter().map(|s| (*s).to_string()).collect(),
            role,
            exp: now + ttl_seconds,
            iat: now,
        }
    }

    fn into_user(self) -> Result<AuthUser, String> {
        let mut stores = self
            .stores
            .iter()
            .map(|s| s.parse::<StoreCode>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.to_string())?;
        stores.sort();
        stores.dedup();
        Ok(AuthUser {
            username: self.sub,
            stores,
            role: self.role,
        })
    }
}

/// Sign claims with the shared secret (HS256)
pub fn encode_token(claims: &Claims, secret: &str) -> Result<String, jsonwebtoken::errors::Error> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Decode and validate JWT token
fn decode_jwt(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("Invalid token: {}", e))
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|header| header.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => return unauthorized_response("Missing or invalid Authorization header"),
    };

    let user = match decode_jwt(token, &state.config.jwt.secret).and_then(Claims::into_user) {
        Ok(user) => user,
        Err(msg) => {
            tracing::debug!(error = %msg, "rejected bearer token");
            return unauthorized_response(&msg);
        }
    };

    request.extensions_mut().insert(user);

    next.run(request).await
}

/// Create unauthorized response
fn unauthorized_response(message: &str) -> Response {
    let error = ErrorResponse {
        error: ErrorDetail::new("UNAUTHORIZED", message, "Não autorizado"),
    };

    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| {
                let error = ErrorResponse {
                    error: ErrorDetail::new(
                        "UNAUTHORIZED",
                        "Authentication required",
                        "É necessário fazer login",
                    ),
                };
                (StatusCode::UNAUTHORIZED, Json(error))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip_normalizes_stores() {
        let claims = Claims::new("ana", &["7", "001", "007"], Role::User, 60);
        let token = encode_token(&claims, "secret").unwrap();
        let user = decode_jwt(&token, "secret")
            .and_then(Claims::into_user)
            .unwrap();
        assert_eq!(user.username, "ana");
        assert_eq!(
            user.stores,
            vec!["001".parse::<StoreCode>().unwrap(), "007".parse().unwrap()]
        );
        assert!(!user.can_approve());
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = encode_token(&Claims::new("ana", &["001"], Role::Admin, 60), "a").unwrap();
        assert!(decode_jwt(&token, "b").is_err());
    }

    #[test]
    fn test_invalid_store_claim_is_rejected() {
        let claims = Claims::new("ana", &["loja"], Role::User, 60);
        assert!(claims.into_user().is_err());
    }

    #[test]
    fn test_roles() {
        assert!(Role::Approver.can_approve());
        assert!(Role::Admin.can_approve());
        assert!(!Role::User.can_approve());
    }
}
