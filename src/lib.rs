pub mod controllers;
pub mod core;
pub mod token;
pub mod types;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::controllers::pins::PinsApi;
use crate::controllers::session::SessionClient;
use crate::controllers::viewport::{MemoryLayer, SyncConfig, SyncOutcome, ViewportSync};
use crate::core::client::HttpTransport;
use crate::core::clock::{Clock, SystemClock};
use crate::core::config::Args;
use crate::core::error::ConfigError as Error;
use crate::token::store::FallbackStore;
use crate::types::geo::{Bounds, Coordinate};

const DEFAULT_CENTER: Coordinate = Coordinate {
    latitude: 51.505,
    longitude: -0.09,
};
const DEFAULT_LAT_SPAN: f64 = 0.05;
const DEFAULT_LNG_SPAN: f64 = 0.1;

pub async fn run() -> Result<(), Error> {
    let config = Args::load()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_new(&config.log_level).unwrap_or_default())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let store = FallbackStore::open(config.storage_dir()?);

    let transport = HttpTransport::new(
        &config.base_url,
        &config.user_agent,
        config.request_timeout(),
    )?;

    let session = Arc::new(SessionClient::new(transport, store, SystemClock));

    session.clean_dead_sessions().await;

    if session.whoami().is_none() {
        if let Some((username, password)) = config.credentials() {
            session.login(username, password).await?;
        }
    }

    match session.whoami() {
        Some(username) => tracing::info!("signed in as {}", username),
        None => tracing::info!("browsing without an account"),
    }

    let api = PinsApi::new(session.clone());

    let visible = match config.view() {
        Some((north, south, east, west)) => Bounds::from_map(north, south, east, west)
            .map_err(|e| Error::Viewport(e.to_string()))?,
        None => {
            let center = match api.map_config().await {
                Ok(map_config) => map_config.geo_ip_location.unwrap_or(DEFAULT_CENTER),
                Err(e) => {
                    tracing::warn!("could not load map config: {}", e.user_message());
                    DEFAULT_CENTER
                }
            };

            Bounds::around(center, DEFAULT_LAT_SPAN, DEFAULT_LNG_SPAN)
                .map_err(|e| Error::Viewport(e.to_string()))?
        }
    };

    let mut sync = ViewportSync::new(
        MemoryLayer::new(visible.center().longitude),
        SyncConfig::default(),
    );

    match sync
        .on_viewport_changed(&api, &visible, session.clock().now())
        .await
    {
        Ok(SyncOutcome::Applied(count)) => tracing::info!("loaded {} pins", count),
        Ok(outcome) => tracing::debug!("viewport sync: {:?}", outcome),
        Err(e) => {
            tracing::error!("{}", e.user_message());
            return Err(e.into());
        }
    }

    for marker in sync.layer().markers() {
        tracing::info!(
            latitude = marker.position.latitude,
            longitude = marker.position.longitude,
            "{}",
            marker.popup
        );
    }

    Ok(())
}
