use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{EncodingKey, Header};

use crate::core::client::{ApiRequest, ApiResponse, Transport};
use crate::core::clock::Clock;
use crate::core::error::Error;
use crate::token::claims::{Claims, Role};

const TEST_SECRET: &[u8] = b"not-the-server-key";

/// Signs a token shaped like the ones the server issues.
pub(crate) fn mint_token(username: &str, role: Role, expiry: DateTime<Utc>) -> String {
    let claims = Claims {
        username: Some(username.to_owned()),
        sub: Some("FOR_BEARER_TOKEN".to_owned()),
        email: Some(format!("{}@example.org", username)),
        role: Some(role),
        exp: Some(expiry.timestamp()),
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET),
    )
    .unwrap()
}

pub(crate) fn token_body(token: &str) -> String {
    serde_json::json!({ "token": token }).to_string()
}

pub(crate) const UNAUTHORIZED_BODY: &str = r#"{"code":4,"description":"unauthorized"}"#;

/// Answers requests from a queue, in order, and remembers what was asked.
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    responses: Mutex<VecDeque<Result<ApiResponse, Error>>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(&self, status: u16, body: impl Into<String>) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(ApiResponse::new(status, body)));
        self
    }

    pub(crate) fn drop_connection(&self) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(Error::Connection("connection reset".to_owned())));
        self
    }

    pub(crate) fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.path).collect()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.responses.lock().unwrap().len()
    }
}

impl Transport for ScriptedTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, Error> {
        self.requests.lock().unwrap().push(request);

        let next = self.responses.lock().unwrap().pop_front();

        next.unwrap_or_else(|| Err(Error::Connection("nothing scripted".to_owned())))
    }
}

#[derive(Debug)]
pub(crate) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(crate) fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
