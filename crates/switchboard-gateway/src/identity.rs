use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::debug;
use uuid::Uuid;

use switchboard_types::api::{Claims, Handshake};
use switchboard_types::models::Role;

/// Resolved connection identity. Anonymous widget visitors resolve to a
/// guest with no user id.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Option<Uuid>,
    pub role: Role,
    pub display_name: String,
    pub locale: String,
}

impl Identity {
    pub fn guest(locale: Option<&str>) -> Self {
        Self {
            user_id: None,
            role: Role::Guest,
            display_name: "Guest".into(),
            locale: locale.unwrap_or("en").into(),
        }
    }
}

/// Turns a connection handshake into an identity, or `None` when the
/// handshake carries nothing usable. Resolution never fails the connection:
/// callers degrade to a guest via [`resolve_or_guest`].
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, handshake: &Handshake) -> Option<Identity>;
}

pub fn resolve_or_guest(resolver: &dyn IdentityResolver, handshake: &Handshake) -> Identity {
    resolver
        .resolve(handshake)
        .unwrap_or_else(|| Identity::guest(handshake.locale.as_deref()))
}

/// Validates storefront-minted JWTs carried in the handshake query string.
pub struct JwtIdentityResolver {
    secret: String,
}

impl JwtIdentityResolver {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl IdentityResolver for JwtIdentityResolver {
    fn resolve(&self, handshake: &Handshake) -> Option<Identity> {
        let token = handshake.token.as_deref()?;

        let data = match decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        ) {
            Ok(data) => data,
            Err(e) => {
                debug!("identity resolution failed, degrading to guest: {}", e);
                return None;
            }
        };

        Some(Identity {
            user_id: Some(data.claims.sub),
            role: data.claims.role,
            display_name: data.claims.name,
            locale: handshake.locale.clone().unwrap_or_else(|| "en".into()),
        })
    }
}
