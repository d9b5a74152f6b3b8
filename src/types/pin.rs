use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::types::geo::Coordinate;
use crate::utils::encode::decode_api_html;

const MIN_TITLE_LENGTH: usize = 4;
const MAX_TITLE_LENGTH: usize = 256;
const MIN_DESCRIPTION_LENGTH: usize = 8;
const MAX_DESCRIPTION_LENGTH: usize = 768;
const MAX_DRESS_CODE_LENGTH: usize = 128;
const MAX_HOME_PAGE_LENGTH: usize = 256;

static HOME_PAGE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://[^\s/$.?#][^\s]*$").expect("static regex"));

/// An absolute http(s) link short enough to store.
pub(crate) fn is_valid_home_page(link: &str) -> bool {
    link.len() <= MAX_HOME_PAGE_LENGTH && HOME_PAGE_PATTERN.is_match(link)
}

/// A pin as the server returns it. Text fields arrive HTML encoded.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pin {
    #[serde(default)]
    pub protest_id: Option<String>,
    pub location: Coordinate,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub dress_code: Option<String>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub home_page: Option<String>,
    #[serde(default)]
    pub recurs_every_days: Option<u32>,
}

impl Pin {
    /// A scheduled event, as opposed to a standing location.
    pub fn is_event(&self) -> bool {
        self.date.is_some()
    }

    /// The editable form of this pin with server encoding removed.
    pub fn to_draft(&self) -> PinDraft {
        PinDraft {
            location: self.location,
            owner: self.owner.as_deref().map(decode_api_html),
            title: decode_api_html(&self.title),
            description: decode_api_html(&self.description),
            dress_code: self.dress_code.as_deref().map(decode_api_html),
            date: self.date,
            home_page: self.home_page.clone(),
            recurs_every_days: self.recurs_every_days,
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct PinList {
    pub(crate) protests: Vec<Pin>,
}

/// Outbound body for creating or editing a pin.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PinDraft {
    pub location: Coordinate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dress_code: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurs_every_days: Option<u32>,
}

impl PinDraft {
    pub fn new(location: Coordinate, title: &str, description: &str) -> Self {
        Self {
            location,
            owner: None,
            title: title.to_owned(),
            description: description.to_owned(),
            dress_code: None,
            date: None,
            home_page: None,
            recurs_every_days: None,
        }
    }

    pub fn scheduled(mut self, date: DateTime<Utc>) -> Self {
        self.date = Some(date);
        self
    }

    /// Same limits the server enforces, checked before anything is sent.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), Error> {
        let title_len = self.title.chars().count();
        if !(MIN_TITLE_LENGTH..=MAX_TITLE_LENGTH).contains(&title_len) {
            return Err(Error::InvalidPin(format!(
                "Title must be between {} and {} characters",
                MIN_TITLE_LENGTH, MAX_TITLE_LENGTH
            )));
        }

        let description_len = self.description.chars().count();
        if !(MIN_DESCRIPTION_LENGTH..=MAX_DESCRIPTION_LENGTH).contains(&description_len) {
            return Err(Error::InvalidPin(format!(
                "Description must be between {} and {} characters",
                MIN_DESCRIPTION_LENGTH, MAX_DESCRIPTION_LENGTH
            )));
        }

        if let Some(dress_code) = &self.dress_code {
            if dress_code.chars().count() > MAX_DRESS_CODE_LENGTH {
                return Err(Error::InvalidPin(format!(
                    "Dress code must be at most {} characters",
                    MAX_DRESS_CODE_LENGTH
                )));
            }
        }

        if let Some(home_page) = &self.home_page {
            if !is_valid_home_page(home_page) {
                return Err(Error::InvalidPin("Home page must be a valid link".to_owned()));
            }
        }

        let Coordinate {
            latitude,
            longitude,
        } = self.location;

        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) || !longitude.is_finite() {
            return Err(Error::InvalidPin("Location is invalid".to_owned()));
        }

        match (self.date, self.recurs_every_days) {
            (Some(date), _) if date < now => {
                return Err(Error::InvalidPin("Must be set in future.".to_owned()));
            }
            (None, Some(_)) => {
                return Err(Error::InvalidPin(
                    "Recurring pins need a date & time".to_owned(),
                ));
            }
            (_, Some(0)) => {
                return Err(Error::InvalidPin(
                    "Recurrence must be at least one day".to_owned(),
                ));
            }
            _ => (),
        }

        Ok(())
    }
}
