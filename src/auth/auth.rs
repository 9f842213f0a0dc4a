use crate::auth::jwt::verify_token;
use crate::config::Config;
use crate::error::ApiError;
use crate::{model::role::Role, models::Claims};
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload, web::Data};
use futures::future::{Ready, ready};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub name: Option<String>,
    pub role: Role,

    /// Present only for center-scoped staff
    pub center_id: Option<String>,
}

/// What a caller may see. Derived from the role, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessScope {
    Global,
    Center(String),
    /// scoped role without an assigned center
    Nothing,
}

impl AccessScope {
    /// The single access predicate shared by every read and write path.
    pub fn allows(&self, center_id: &str) -> bool {
        match self {
            AccessScope::Global => true,
            AccessScope::Center(own) => own == center_id,
            AccessScope::Nothing => false,
        }
    }

    pub fn check(&self, center_id: &str) -> Result<(), ApiError> {
        if self.allows(center_id) {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Access denied".into()))
        }
    }
}

impl AuthUser {
    pub fn from_claims(claims: Claims) -> Option<Self> {
        let role = Role::from_claim(&claims.role)?;
        Some(AuthUser {
            user_id: claims.sub,
            name: claims.name,
            role,
            center_id: claims.center_id.filter(|c| !c.is_empty()),
        })
    }

    pub fn scope(&self) -> AccessScope {
        match (self.role, &self.center_id) {
            (Role::Admin, _) => AccessScope::Global,
            (Role::Staff, Some(center)) => AccessScope::Center(center.clone()),
            (Role::Staff, None) => AccessScope::Nothing,
        }
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin only".into()))
        }
    }
}

impl FromRequest for AuthUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        // set by auth_middleware on protected scopes
        if let Some(user) = req.extensions().get::<AuthUser>() {
            return ready(Ok(user.clone()));
        }

        let token = match req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => return ready(Err(ApiError::Unauthorized("Missing token".into()).into())),
        };

        let config = match req.app_data::<Data<Config>>() {
            Some(c) => c,
            None => {
                return ready(Err(
                    actix_web::error::ErrorInternalServerError("Config missing"),
                ));
            }
        };

        let claims = match verify_token(token, &config.jwt_secret) {
            Ok(c) => c,
            Err(_) => return ready(Err(ApiError::Unauthorized("Invalid token".into()).into())),
        };

        match AuthUser::from_claims(claims) {
            Some(user) => ready(Ok(user)),
            None => ready(Err(ApiError::Unauthorized("Invalid role".into()).into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role, center: Option<&str>) -> AuthUser {
        AuthUser {
            user_id: "u1".into(),
            name: None,
            role,
            center_id: center.map(str::to_string),
        }
    }

    #[test]
    fn admin_reaches_every_center() {
        let scope = user(Role::Admin, None).scope();
        assert_eq!(scope, AccessScope::Global);
        assert!(scope.allows("north"));
        assert!(scope.allows("south"));
    }

    #[test]
    fn staff_reaches_only_their_center() {
        let scope = user(Role::Staff, Some("north")).scope();
        assert!(scope.allows("north"));
        assert!(!scope.allows("south"));
        assert!(scope.check("south").is_err());
    }

    #[test]
    fn staff_without_center_reaches_nothing() {
        let scope = user(Role::Staff, None).scope();
        assert_eq!(scope, AccessScope::Nothing);
        assert!(!scope.allows("north"));
    }

    #[test]
    fn empty_center_claim_counts_as_missing() {
        let claims = Claims {
            sub: "u1".into(),
            name: None,
            role: "staff".into(),
            center_id: Some(String::new()),
            exp: 0,
            jti: "j".into(),
        };
        let user = AuthUser::from_claims(claims).unwrap();
        assert_eq!(user.scope(), AccessScope::Nothing);
    }
}
