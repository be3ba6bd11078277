use anyhow::Context;
use async_trait::async_trait;
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Resolves the user behind a bearer token. Failures are reported to the
/// caller, which decides whether they matter.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenIntrospector: Send + Sync {
    async fn resolve_user(&self, token: &str) -> anyhow::Result<Option<i64>>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
}

/// Verifies HS256 access tokens and reads the user id from `sub`.
pub struct JwtIntrospector {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIntrospector {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation: Validation::default(),
        }
    }
}

#[async_trait]
impl TokenIntrospector for JwtIntrospector {
    async fn resolve_user(&self, token: &str) -> anyhow::Result<Option<i64>> {
        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        let user_id = data
            .claims
            .sub
            .parse::<i64>()
            .with_context(|| format!("token subject `{}` is not a user id", data.claims.sub))?;
        Ok(Some(user_id))
    }
}
