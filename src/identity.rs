//! Identity resolution.
//!
//! Authentication is delegated to an external identity provider. Requests
//! carry the provider's session JWT; the extractor verifies it and maps the
//! external subject to a local user row, creating the row on first sight.

use anyhow::Context;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{User, UserRole};
use crate::state::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    /// External identity-provider id.
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub exp: usize,
}

impl Claims {
    pub fn role(&self) -> UserRole {
        match self.role.as_deref() {
            Some("SELLER") => UserRole::Seller,
            _ => UserRole::Buyer,
        }
    }
}

/// Extracts the authenticated local user, materializing it on demand.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(ApiError::Unauthenticated)?;
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or(ApiError::Unauthenticated)?;

        let claims = verify_session_token(state, token)?;
        let user = resolve_user(state, claims).await?;
        Ok(AuthUser(user))
    }
}

pub fn verify_session_token(state: &AppState, token: &str) -> Result<Claims, ApiError> {
    let cfg = &state.config.identity;
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(std::slice::from_ref(&cfg.issuer));
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(cfg.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|_| ApiError::Unauthenticated)?;
    Ok(data.claims)
}

/// Maps the external subject to the local user row, inserting on first
/// sight. When the token carries no profile fields, the provider API is
/// asked for them once before the insert.
pub async fn resolve_user(state: &AppState, claims: Claims) -> Result<User, ApiError> {
    let existing = sqlx::query_as::<_, User>("SELECT * FROM users WHERE external_id = $1")
        .bind(&claims.sub)
        .fetch_optional(&state.db)
        .await?;
    if let Some(user) = existing {
        return Ok(user);
    }

    let role = claims.role();
    let (email, name, avatar_url) = match claims.email {
        Some(email) => (email, claims.name.unwrap_or_default(), None),
        None => {
            let profile = fetch_profile(state, &claims.sub)
                .await
                .context("fetch profile from identity provider")?;
            (
                profile.primary_email().unwrap_or_default(),
                profile.full_name(),
                profile.image_url,
            )
        }
    };

    let user = upsert_user(
        &state.db,
        &claims.sub,
        &email,
        &name,
        avatar_url.as_deref(),
        role,
    )
    .await?;
    Ok(user)
}

/// The upsert keeps concurrent first requests for the same subject safe:
/// whichever insert loses the race updates instead.
pub async fn upsert_user(
    db: &PgPool,
    external_id: &str,
    email: &str,
    name: &str,
    avatar_url: Option<&str>,
    role: UserRole,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (id, external_id, email, name, avatar_url, role) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (external_id) DO UPDATE \
         SET email = EXCLUDED.email, name = EXCLUDED.name, \
             avatar_url = EXCLUDED.avatar_url, updated_at = NOW() \
         RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(external_id)
    .bind(email)
    .bind(name)
    .bind(avatar_url)
    .bind(role)
    .fetch_one(db)
    .await
}

/// Profile payload used both by the provider API and its webhook events.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderProfile {
    pub id: String,
    #[serde(default)]
    pub email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailAddress {
    pub email_address: String,
}

impl ProviderProfile {
    pub fn primary_email(&self) -> Option<String> {
        self.email_addresses
            .first()
            .map(|e| e.email_address.clone())
    }

    pub fn full_name(&self) -> String {
        let mut name = self.first_name.clone().unwrap_or_default();
        if let Some(last) = &self.last_name {
            if !name.is_empty() {
                name.push(' ');
            }
            name.push_str(last);
        }
        name
    }
}

/// Webhook envelope posted by the identity provider.
#[derive(Debug, Deserialize)]
pub struct IdentityEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: ProviderProfile,
}

pub async fn fetch_profile(
    state: &AppState,
    external_id: &str,
) -> anyhow::Result<ProviderProfile> {
    let cfg = &state.config.identity;
    let url = format!("{}/v1/users/{}", cfg.api_url, external_id);
    let profile = state
        .http
        .get(&url)
        .bearer_auth(&cfg.api_key)
        .send()
        .await
        .context("identity provider unreachable")?
        .error_for_status()
        .context("identity provider rejected profile fetch")?
        .json::<ProviderProfile>()
        .await
        .context("malformed identity provider profile")?;
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    #[test]
    fn test_full_name_joins_parts() {
        let p = ProviderProfile {
            id: "user_1".into(),
            email_addresses: vec![EmailAddress {
                email_address: "a@example.com".into(),
            }],
            first_name: Some("Asha".into()),
            last_name: Some("Rao".into()),
            image_url: None,
        };
        assert_eq!(p.full_name(), "Asha Rao");
        assert_eq!(p.primary_email().as_deref(), Some("a@example.com"));
    }

    #[test]
    fn test_full_name_handles_missing_parts() {
        let p = ProviderProfile {
            id: "user_2".into(),
            email_addresses: vec![],
            first_name: None,
            last_name: Some("Rao".into()),
            image_url: None,
        };
        assert_eq!(p.full_name(), "Rao");
        assert!(p.primary_email().is_none());
    }

    #[test]
    fn test_role_claim_mapping() {
        let mut claims = Claims {
            sub: "user_3".into(),
            email: None,
            name: None,
            role: Some("SELLER".into()),
            exp: 0,
        };
        assert_eq!(claims.role(), UserRole::Seller);
        claims.role = Some("whatever".into());
        assert_eq!(claims.role(), UserRole::Buyer);
        claims.role = None;
        assert_eq!(claims.role(), UserRole::Buyer);
    }

    #[test]
    fn test_session_token_roundtrip() {
        #[derive(serde::Serialize)]
        struct TestClaims<'a> {
            sub: &'a str,
            iss: &'a str,
            email: &'a str,
            exp: usize,
        }
        let secret = b"test-secret";
        let token = encode(
            &Header::default(),
            &TestClaims {
                sub: "user_9",
                iss: "identity",
                email: "u@example.com",
                exp: (chrono::Utc::now().timestamp() + 600) as usize,
            },
            &EncodingKey::from_secret(secret),
        )
        .unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&["identity"]);
        let data = decode::<Claims>(
            &token,
            &DecodingKey::from_secret(secret),
            &validation,
        )
        .unwrap();
        assert_eq!(data.claims.sub, "user_9");
        assert_eq!(data.claims.email.as_deref(), Some("u@example.com"));

        let mut wrong_issuer = Validation::new(Algorithm::HS256);
        wrong_issuer.set_issuer(&["someone-else"]);
        assert!(decode::<Claims>(
            &token,
            &DecodingKey::from_secret(secret),
            &wrong_issuer
        )
        .is_err());
    }
}
