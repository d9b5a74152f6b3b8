use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use jsonwebtoken::{self, Algorithm, DecodingKey, Validation};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::error::Error;

static TOKEN_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+$").expect("static regex")
});

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Moderator,
    Planner,
    User,
    Unauthenticated,
}

impl Role {
    /// Whether this role may edit or delete pins owned by someone else.
    pub fn can_moderate(&self) -> bool {
        matches!(self, Role::Admin | Role::Moderator)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Claims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

impl Claims {
    /// The user this token was issued to. The server puts the public username
    /// in `username`; tokens without it fall back to `sub`.
    pub fn identity(&self) -> Option<&str> {
        self.username.as_deref().or(self.sub.as_deref())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// A token without an expiry never counts as expired here; the server
    /// still has the final say.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at() {
            Some(expiry) => expiry <= now,
            None => false,
        }
    }
}

pub fn is_structurally_valid(token: &str) -> bool {
    TOKEN_SHAPE.is_match(token)
}

/// Reads the claims out of a server-issued token. The signature is not checked:
/// the server is the verifier, the client only needs the claims for display and
/// expiry decisions.
pub fn decode_claims(token: &str) -> Result<Claims, Error> {
    if !is_structurally_valid(token) {
        return Err(Error::InvalidToken(
            "expected three base64url segments".to_owned(),
        ));
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    let data = jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation)?;

    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mint_token;
    use chrono::Duration;

    #[test]
    fn test_decode_round_trips_server_claims() {
        let expiry = Utc::now() + Duration::hours(1);
        let token = mint_token("alice", Role::Planner, expiry);

        let claims = decode_claims(&token).unwrap();

        assert_eq!(claims.identity(), Some("alice"));
        assert_eq!(claims.role, Some(Role::Planner));
        assert_eq!(claims.exp, Some(expiry.timestamp()));
    }

    #[test]
    fn test_identity_falls_back_to_subject() {
        let claims = Claims {
            sub: Some("bob".into()),
            ..Default::default()
        };

        assert_eq!(claims.identity(), Some("bob"));
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let claims = Claims {
            exp: Some(now.timestamp() - 10),
            ..Default::default()
        };

        assert!(claims.is_expired(now));
        assert!(!Claims::default().is_expired(now));
    }

    #[test]
    fn test_rejects_malformed_tokens() {
        assert!(!is_structurally_valid(""));
        assert!(!is_structurally_valid("only.two"));
        assert!(!is_structurally_valid("a.b.c.d"));
        assert!(!is_structurally_valid("a.b c.d"));
        assert!(is_structurally_valid("abc.DEF_-.123"));

        assert!(matches!(
            decode_claims("not-a-token"),
            Err(Error::InvalidToken(_))
        ));
        // right shape, garbage payload
        assert!(matches!(decode_claims("aaaa.bbbb.cccc"), Err(Error::Jwt(_))));
    }

    #[test]
    fn test_moderation_roles() {
        assert!(Role::Admin.can_moderate());
        assert!(Role::Moderator.can_moderate());
        assert!(!Role::Planner.can_moderate());
        assert!(!Role::User.can_moderate());
    }
}
