use serde::Serialize;

use crate::types::geo::Bounds;

#[derive(Serialize)]
pub(crate) struct LoginData<'a> {
    pub(crate) username: &'a str,
    pub(crate) password: &'a str,
}

#[derive(Serialize)]
pub(crate) struct RefreshData<'a> {
    pub(crate) token: &'a str,
}

/// Serialises to `{}`.
#[derive(Serialize)]
pub(crate) struct Empty {}

/// Query for `GET /api/pins`: corners as `lat,lng`.
#[derive(Debug, PartialEq, Serialize)]
pub(crate) struct PinQuery {
    #[serde(rename = "SW")]
    pub(crate) sw: String,
    #[serde(rename = "NE")]
    pub(crate) ne: String,
}

impl From<&Bounds> for PinQuery {
    fn from(bounds: &Bounds) -> Self {
        Self {
            sw: format!("{},{}", bounds.south, bounds.west),
            ne: format!("{},{}", bounds.north, bounds.east),
        }
    }
}
