use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::instrument;

use crate::core::client::{ApiRequest, ApiResponse, Transport};
use crate::core::clock::Clock;
use crate::core::error::{ApiError, Error, ErrorKind};
use crate::token::claims::{Claims, Role, decode_claims, is_structurally_valid};
use crate::token::store::{AUTHORIZATION_STORAGE_KEY, SessionStore};
use crate::types::request::{Empty, LoginData, RefreshData};
use crate::types::response::{Token, WhoAmI};

pub const LOGIN_PATH: &str = "/api/login";
pub const REFRESH_PATH: &str = "/api/refresh-token";
pub const LOGOUT_PATH: &str = "/api/logout";
pub const WHOAMI_PATH: &str = "/api/whoami";

/// A successful response body together with the status it arrived with.
struct Payload {
    status: u16,
    value: Value,
}

impl Payload {
    fn decode<R: DeserializeOwned>(self) -> Result<R, Error> {
        let status = self.status;

        serde_json::from_value(self.value).map_err(|e| Error::MalformedResponse {
            status,
            message: e.to_string(),
        })
    }
}

/// Owns the bearer token and performs authenticated requests, refreshing the
/// token once when the server answers a call with "unauthorized".
#[derive(Debug)]
pub struct SessionClient<T, S, C> {
    transport: T,
    store: S,
    clock: C,
}

impl<T: Transport, S: SessionStore, C: Clock> SessionClient<T, S, C> {
    pub fn new(transport: T, store: S, clock: C) -> Self {
        Self {
            transport,
            store,
            clock,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// The raw bearer token, if one is held.
    pub fn token(&self) -> Option<String> {
        match self.store.get_item(AUTHORIZATION_STORAGE_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                tracing::warn!("could not read session token: {}", e);
                None
            }
        }
    }

    fn store_token(&self, token: &str) -> Result<(), Error> {
        self.store.set_item(AUTHORIZATION_STORAGE_KEY, token)
    }

    /// Forgets the session locally.
    pub fn clear(&self) {
        if let Err(e) = self.store.remove_item(AUTHORIZATION_STORAGE_KEY) {
            tracing::error!("could not clear session token: {}", e);
        }
    }

    pub fn claims(&self) -> Option<Claims> {
        let token = self.token()?;

        match decode_claims(&token) {
            Ok(claims) => Some(claims),
            Err(e) => {
                tracing::debug!("held token has unreadable claims: {}", e);
                None
            }
        }
    }

    /// Identity of the logged in user, read from the token without a request.
    pub fn whoami(&self) -> Option<String> {
        self.claims()?.identity().map(str::to_owned)
    }

    pub fn current_role(&self) -> Option<Role> {
        self.claims()?.role
    }

    pub fn is_expired(&self) -> bool {
        self.claims()
            .is_some_and(|claims| claims.is_expired(self.clock.now()))
    }

    #[instrument(skip_all)]
    pub async fn login(&self, username: &str, password: &str) -> Result<(), Error> {
        let body = serde_json::to_string(&LoginData { username, password })?;

        let token = self
            .exchange_token(ApiRequest::new(Method::POST, LOGIN_PATH).with_body(body))
            .await?;

        self.store_token(&token)?;

        tracing::info!("logged in as {}", username);

        Ok(())
    }

    /// Logs out on the server. The local session is cleared whatever the
    /// server says, including when it cannot be reached.
    #[instrument(skip_all)]
    pub async fn logout(&self) -> Result<(), Error> {
        let result = self.send_logout(self.token()).await;

        self.clear();

        match &result {
            Ok(()) => tracing::info!("logged out"),
            Err(e) => tracing::warn!("logout request failed, session cleared locally: {}", e),
        }

        result
    }

    async fn send_logout(&self, token: Option<String>) -> Result<(), Error> {
        let request = ApiRequest::new(Method::POST, LOGOUT_PATH)
            .with_body(serde_json::to_string(&Empty {})?)
            .with_bearer(token);

        let response = self.transport.execute(request).await?;

        interpret(response).map(|_| ())
    }

    /// Exchanges the held token for a fresh one.
    #[instrument(skip_all)]
    pub async fn refresh(&self) -> Result<(), Error> {
        let current = self.token().ok_or(Error::NotLoggedIn)?;

        let body = serde_json::to_string(&RefreshData { token: &current })?;

        match self
            .exchange_token(ApiRequest::new(Method::POST, REFRESH_PATH).with_body(body))
            .await
        {
            Ok(token) => {
                self.store_token(&token)?;
                tracing::info!("session refreshed");
                Ok(())
            }
            Err(e) => {
                if e.is_unauthorized() {
                    tracing::warn!("refresh rejected, clearing session");
                    self.clear();
                }
                Err(e)
            }
        }
    }

    async fn exchange_token(&self, request: ApiRequest) -> Result<String, Error> {
        let response = self.transport.execute(request).await?;

        let payload = interpret(response)?;
        let status = payload.status;
        let Token { token } = payload.decode()?;

        if !is_structurally_valid(&token) {
            return Err(Error::MalformedResponse {
                status,
                message: "response did not carry a usable token".to_owned(),
            });
        }

        Ok(token)
    }

    /// Performs an authenticated request. For GET the body becomes the query
    /// string, otherwise it is sent as JSON.
    ///
    /// An unauthorized answer while a token is held triggers one refresh and
    /// one retry; the retry's outcome is returned as is. A failed refresh
    /// clears the session and returns the original failure.
    pub async fn call<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<Value, Error> {
        Ok(self.call_payload(method, path, body).await?.value)
    }

    /// [`call`](Self::call) plus deserialisation of the success body.
    pub async fn call_json<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<R, Error> {
        self.call_payload(method, path, body).await?.decode()
    }

    async fn call_payload<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<Payload, Error> {
        let request = build_request(method, path, body)?;

        match self.send(request.clone()).await {
            Err(e) if e.is_unauthorized() => {
                if self.token().is_none() {
                    return Err(e);
                }

                tracing::debug!("{} was unauthorized, refreshing session", path);

                if let Err(refresh_err) = self.refresh().await {
                    tracing::warn!("could not refresh session: {}", refresh_err);
                    self.clear();
                    return Err(e);
                }

                self.send(request).await
            }
            other => other,
        }
    }

    async fn send(&self, request: ApiRequest) -> Result<Payload, Error> {
        let response = self
            .transport
            .execute(request.with_bearer(self.token()))
            .await?;

        interpret(response)
    }

    /// Drops a session the server will no longer honour. Run once at startup;
    /// never fails.
    #[instrument(skip_all)]
    pub async fn clean_dead_sessions(&self) {
        let Some(token) = self.token() else {
            return;
        };

        let claims = match decode_claims(&token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::warn!("stored session token is unreadable, clearing: {}", e);
                self.clear();
                return;
            }
        };

        if claims.is_expired(self.clock.now()) {
            match self.refresh().await {
                Ok(()) => tracing::info!("expired session refreshed"),
                Err(e) => tracing::info!("expired session could not be refreshed: {}", e),
            }
            return;
        }

        match self
            .call_json::<_, WhoAmI>(Method::GET, WHOAMI_PATH, &Empty {})
            .await
        {
            Ok(me) if !me.api_token_valid => {
                tracing::info!("server no longer accepts the session, clearing");
                self.clear();
            }
            Ok(_) => tracing::debug!("session is live"),
            Err(e) if e.is_unauthorized() => {
                tracing::info!("session rejected by server, clearing");
                self.clear();
            }
            Err(e) => tracing::warn!("could not verify session: {}", e),
        }
    }
}

fn build_request<B: Serialize + ?Sized>(
    method: Method,
    path: &str,
    body: &B,
) -> Result<ApiRequest, Error> {
    if method == Method::GET {
        let query = serde_urlencoded::to_string(body)?;
        Ok(ApiRequest::new(method, path).with_query(query))
    } else {
        let json = serde_json::to_string(body)?;
        Ok(ApiRequest::new(method, path).with_body(json))
    }
}

/// Turns a raw response into a JSON payload or an error. The server may also
/// report failure inside a 2xx body through a non-zero `code`.
fn interpret(response: ApiResponse) -> Result<Payload, Error> {
    let status = response.status;

    if !response.is_success() {
        return Err(Error::Api(ApiError::from_body(status, &response.body)));
    }

    if response.body.trim().is_empty() {
        return Ok(Payload {
            status,
            value: Value::Null,
        });
    }

    let value: Value =
        serde_json::from_str(&response.body).map_err(|e| Error::MalformedResponse {
            status,
            message: e.to_string(),
        })?;

    if let Some(kind) = value
        .get("code")
        .and_then(Value::as_i64)
        .and_then(ErrorKind::from_code)
    {
        return Err(Error::Api(ApiError {
            status,
            kind: Some(kind),
            description: value
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_owned),
        }));
    }

    Ok(Payload { status, value })
}
