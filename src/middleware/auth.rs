use crate::identity::{AdminRoster, RequestIdentity};
use crate::user::model::{AuthorSnapshot, UserProfile};
use crate::user::service::UserService;
use crate::utils::error::{CustomError, tolerate_store_failure};
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub id: String,
    pub exp: usize,
}

/// Token secret and admin roster shared by every request.
pub struct AuthSettings {
    secret: String,
    roster: AdminRoster,
}

impl AuthSettings {
    pub fn new(secret: impl Into<String>, roster: AdminRoster) -> Self {
        Self {
            secret: secret.into(),
            roster,
        }
    }

    /// Verify a bearer token and return its claims
    pub fn decode_claims(&self, token: &str) -> Result<Claims, CustomError> {
        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map(|data| data.claims)
        .map_err(|_| CustomError::UnauthenticatedError("Invalid token".to_string()))
    }
}

/// The person behind a request, possibly anonymous.
#[derive(Debug, Clone)]
pub struct Viewer {
    pub identity: RequestIdentity,
    pub profile: Option<UserProfile>,
}

impl Viewer {
    pub fn anonymous() -> Self {
        Self {
            identity: RequestIdentity::anonymous(),
            profile: None,
        }
    }

    /// Author snapshot for a new comment; needs a completed profile
    pub fn author(&self) -> Result<AuthorSnapshot, CustomError> {
        self.profile
            .as_ref()
            .map(UserProfile::author_snapshot)
            .ok_or_else(|| {
                CustomError::InvalidInputError(
                    "Complete your profile before commenting".to_string(),
                )
            })
    }
}

/// Resolve the viewer from an optional bearer token.
///
/// No token means an anonymous viewer. A token that fails verification is
/// rejected. If the profile lookup hits a store failure the viewer is still
/// signed in, just without a profile.
pub async fn resolve_viewer(
    token: Option<&str>,
    settings: &AuthSettings,
    users: &UserService,
) -> Result<Viewer, CustomError> {
    let Some(token) = token else {
        return Ok(Viewer::anonymous());
    };

    let claims = settings.decode_claims(token)?;
    let profile = tolerate_store_failure("profile lookup", users.get_profile(&claims.id).await)?
        .flatten();
    let identity = RequestIdentity::resolve(&claims.id, &settings.roster, profile.as_ref());

    Ok(Viewer { identity, profile })
}
