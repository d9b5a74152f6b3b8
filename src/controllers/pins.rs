use std::sync::Arc;

use reqwest::Method;

use crate::controllers::session::{SessionClient, WHOAMI_PATH};
use crate::controllers::viewport::PinSource;
use crate::core::client::Transport;
use crate::core::clock::Clock;
use crate::core::error::Error;
use crate::token::store::SessionStore;
use crate::types::geo::Bounds;
use crate::types::pin::{Pin, PinDraft, PinList};
use crate::types::request::{Empty, PinQuery};
use crate::types::response::{MapConfig, Token, UserInfo, WhoAmI};
use crate::utils::encode::decode_api_html;

pub const PINS_PATH: &str = "/api/pins";
pub const PROTESTS_PATH: &str = "/api/protests";
pub const MAP_CONFIG_PATH: &str = "/api/map-config";
pub const MAP_API_TOKEN_PATH: &str = "/api/test/map-api-token";
pub const USER_PATH: &str = "/api/user";

/// Typed endpoints of the pin server, all going through one session.
#[derive(Debug)]
pub struct PinsApi<T, S, C> {
    session: Arc<SessionClient<T, S, C>>,
}

impl<T, S, C> Clone for PinsApi<T, S, C> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
        }
    }
}

fn path_segment(kind: &str, value: &str) -> Result<String, Error> {
    let valid = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');

    if valid {
        Ok(value.to_owned())
    } else {
        Err(Error::InvalidUrl(format!("invalid {}: {:?}", kind, value)))
    }
}

impl<T: Transport, S: SessionStore, C: Clock> PinsApi<T, S, C> {
    pub fn new(session: Arc<SessionClient<T, S, C>>) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &SessionClient<T, S, C> {
        &self.session
    }

    pub async fn fetch(&self, bounds: &Bounds) -> Result<Vec<Pin>, Error> {
        let list: PinList = self
            .session
            .call_json(Method::GET, PINS_PATH, &PinQuery::from(bounds))
            .await?;

        tracing::debug!("fetched {} pins", list.protests.len());

        Ok(list.protests)
    }

    /// Validates and submits a new pin owned by the logged in user.
    pub async fn create(&self, mut draft: PinDraft) -> Result<(), Error> {
        let owner = self.session.whoami().ok_or(Error::NotLoggedIn)?;

        draft.owner = Some(owner);
        draft.validate(self.session.clock().now())?;

        self.session.call(Method::POST, PINS_PATH, &draft).await?;

        tracing::info!("created pin {:?}", draft.title);

        Ok(())
    }

    pub async fn update(&self, protest_id: &str, draft: &PinDraft) -> Result<(), Error> {
        let path = format!("{}/{}", PROTESTS_PATH, path_segment("pin id", protest_id)?);

        draft.validate(self.session.clock().now())?;

        self.session.call(Method::POST, &path, draft).await?;

        tracing::info!("updated pin {}", protest_id);

        Ok(())
    }

    pub async fn delete(&self, protest_id: &str) -> Result<(), Error> {
        let path = format!("{}/{}", PROTESTS_PATH, path_segment("pin id", protest_id)?);

        self.session.call(Method::DELETE, &path, &Empty {}).await?;

        tracing::info!("deleted pin {}", protest_id);

        Ok(())
    }

    pub async fn map_config(&self) -> Result<MapConfig, Error> {
        self.session
            .call_json(Method::GET, MAP_CONFIG_PATH, &Empty {})
            .await
    }

    pub async fn map_api_token(&self) -> Result<String, Error> {
        let Token { token } = self
            .session
            .call_json(Method::GET, MAP_API_TOKEN_PATH, &Empty {})
            .await?;

        Ok(token)
    }

    pub async fn user(&self, username: &str) -> Result<UserInfo, Error> {
        let path = format!("{}/{}", USER_PATH, path_segment("username", username)?);

        self.session.call_json(Method::GET, &path, &Empty {}).await
    }

    /// Asks the server who the current token belongs to.
    pub async fn whoami_remote(&self) -> Result<WhoAmI, Error> {
        self.session
            .call_json(Method::GET, WHOAMI_PATH, &Empty {})
            .await
    }

    /// Owners may edit their own pins; moderators may edit any.
    pub fn can_edit(&self, pin: &Pin) -> bool {
        let Some(claims) = self.session.claims() else {
            return false;
        };

        if claims.role.is_some_and(|role| role.can_moderate()) {
            return true;
        }

        match (claims.identity(), &pin.owner) {
            (Some(me), Some(owner)) => decode_api_html(owner) == me,
            _ => false,
        }
    }
}

impl<T: Transport, S: SessionStore, C: Clock> PinSource for PinsApi<T, S, C> {
    async fn fetch_pins(&self, bounds: &Bounds) -> Result<Vec<Pin>, Error> {
        self.fetch(bounds).await
    }
}
