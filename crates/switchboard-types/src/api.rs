use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Role;

/// JWT claims minted by the storefront and presented in the WebSocket
/// handshake. Canonical definition lives here so the gateway and any future
/// REST middleware share one shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub role: Role,
    pub exp: usize,
}

/// Query parameters accepted on the WebSocket upgrade request. The widget
/// runs without a token; the dashboard passes one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Handshake {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
}
