use std::time::{SystemTime, UNIX_EPOCH};

use crate::{model::role::Role, models::Claims};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::Error};
use once_cell::sync::Lazy;
use uuid::Uuid;

static VALIDATION: Lazy<Validation> = Lazy::new(Validation::default);

fn now() -> usize {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as usize)
        .unwrap_or(0)
}

/// Mints an HS256 access token. Used for service accounts and tests; end
/// users receive tokens from the identity provider.
pub fn generate_access_token(
    user_id: &str,
    name: Option<String>,
    role: Role,
    center_id: Option<String>,
    secret: &str,
    ttl: usize,
) -> Result<String, Error> {
    let claims = Claims {
        sub: user_id.to_string(),
        name,
        role: role.to_string(),
        center_id,
        exp: now() + ttl,
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn verify_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &VALIDATION)
        .map(|data| data.claims)
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minted_token_round_trips_claims() {
        let token = generate_access_token(
            "staff-7",
            Some("Dana".into()),
            Role::Staff,
            Some("north".into()),
            "secret",
            60,
        )
        .unwrap();

        let claims = verify_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, "staff-7");
        assert_eq!(claims.role, "staff");
        assert_eq!(claims.center_id.as_deref(), Some("north"));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_access_token("a", None, Role::Admin, None, "secret", 60).unwrap();
        assert!(verify_token(&token, "other").is_err());
    }
}
