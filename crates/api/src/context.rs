use painterp_auth::JwtClaims;
use painterp_core::UserId;

/// Authenticated caller for a request, derived from the bearer token.
///
/// Inserted into request extensions by the auth middleware and present on
/// every protected route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    user_id: UserId,
    name: Option<String>,
    email: Option<String>,
}

impl PrincipalContext {
    pub fn new(user_id: UserId, name: Option<String>, email: Option<String>) -> Self {
        Self {
            user_id,
            name,
            email,
        }
    }

    pub fn from_claims(claims: JwtClaims) -> Self {
        Self::new(claims.sub, claims.name, claims.email)
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}
