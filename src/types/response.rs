use serde::Deserialize;

use crate::token::claims::Role;
use crate::types::geo::Coordinate;

#[derive(Deserialize)]
pub(crate) struct Token {
    pub(crate) token: String,
}

/// Initial map setup: the tile API token and, when the server could place the
/// caller, a rough location to centre on.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapConfig {
    pub token: String,
    #[serde(default)]
    pub geo_ip_location: Option<Coordinate>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct UserInfo {
    pub username: String,
    pub email: String,
    pub role: Role,
}

/// The server's view of the current caller.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoAmI {
    #[serde(default)]
    pub username: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub api_token_valid: bool,
}
