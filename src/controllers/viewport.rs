use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::core::error::Error;
use crate::types::geo::{Bounds, Coordinate, denormalize_longitude};
use crate::types::pin::Pin;
use crate::utils::render::render_popup;

/// Fraction of the visible span added around it when fetching, half per side.
pub const LOAD_ZONE_BUFFER_FACTOR: f64 = 1.25;
/// Loaded pins are considered stale after this long.
pub const PIN_REFRESH_PERIOD: Duration = Duration::from_secs(60);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyncConfig {
    pub buffer_factor: f64,
    pub refresh_period: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            buffer_factor: LOAD_ZONE_BUFFER_FACTOR,
            refresh_period: PIN_REFRESH_PERIOD,
        }
    }
}

/// Where pins come from.
pub trait PinSource: Send + Sync {
    fn fetch_pins(
        &self,
        bounds: &Bounds,
    ) -> impl Future<Output = Result<Vec<Pin>, Error>> + Send;
}

/// The map surface markers are drawn on.
pub trait MarkerLayer {
    type Marker;

    /// Longitude of the map centre, unnormalised when the map has been panned
    /// onto another world copy.
    fn center_longitude(&self) -> f64;

    fn add_marker(&mut self, position: Coordinate, popup: String) -> Self::Marker;

    fn remove_marker(&mut self, marker: Self::Marker);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct MarkerId(u64);

#[derive(Clone, Debug, PartialEq)]
pub struct PlacedMarker {
    pub position: Coordinate,
    pub popup: String,
}

/// A marker layer with no display attached.
#[derive(Debug, Default)]
pub struct MemoryLayer {
    center_longitude: f64,
    markers: BTreeMap<MarkerId, PlacedMarker>,
    next_id: u64,
}

impl MemoryLayer {
    pub fn new(center_longitude: f64) -> Self {
        Self {
            center_longitude,
            ..Self::default()
        }
    }

    pub fn set_center_longitude(&mut self, center_longitude: f64) {
        self.center_longitude = center_longitude;
    }

    pub fn markers(&self) -> impl Iterator<Item = &PlacedMarker> {
        self.markers.values()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }
}

impl MarkerLayer for MemoryLayer {
    type Marker = MarkerId;

    fn center_longitude(&self) -> f64 {
        self.center_longitude
    }

    fn add_marker(&mut self, position: Coordinate, popup: String) -> MarkerId {
        let id = MarkerId(self.next_id);
        self.next_id += 1;
        self.markers.insert(id, PlacedMarker { position, popup });
        id
    }

    fn remove_marker(&mut self, marker: MarkerId) {
        self.markers.remove(&marker);
    }
}

/// Issued by [`ViewportSync::begin`]; hand it back to
/// [`ViewportSync::complete`] with the fetch result.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FetchTicket {
    generation: u64,
    bounds: Bounds,
}

impl FetchTicket {
    /// The buffered region to request pins for.
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The visible area is already loaded and fresh.
    Unchanged,
    /// Markers were replaced with this many pins.
    Applied(usize),
    /// A newer fetch was issued after this one; its result was dropped.
    Superseded,
}

type PopupRenderer = Box<dyn Fn(&Pin) -> String + Send + Sync>;

/// Keeps a marker layer in step with the pins around the visible map area.
pub struct ViewportSync<L: MarkerLayer> {
    config: SyncConfig,
    layer: L,
    render: PopupRenderer,
    current_zone: Option<Bounds>,
    last_fetch: Option<DateTime<Utc>>,
    markers: Vec<L::Marker>,
    generation: u64,
}

impl<L: MarkerLayer> fmt::Debug for ViewportSync<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewportSync")
            .field("config", &self.config)
            .field("current_zone", &self.current_zone)
            .field("last_fetch", &self.last_fetch)
            .field("markers", &self.markers.len())
            .field("generation", &self.generation)
            .finish()
    }
}

impl<L: MarkerLayer> ViewportSync<L> {
    pub fn new(layer: L, config: SyncConfig) -> Self {
        Self {
            config,
            layer,
            render: Box::new(render_popup),
            current_zone: None,
            last_fetch: None,
            markers: Vec::new(),
            generation: 0,
        }
    }

    pub fn with_renderer(
        mut self,
        render: impl Fn(&Pin) -> String + Send + Sync + 'static,
    ) -> Self {
        self.render = Box::new(render);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn layer(&self) -> &L {
        &self.layer
    }

    pub fn layer_mut(&mut self) -> &mut L {
        &mut self.layer
    }

    /// The buffered region most recently requested.
    pub fn current_zone(&self) -> Option<&Bounds> {
        self.current_zone.as_ref()
    }

    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    fn is_stale(&self, last_fetch: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        (now - last_fetch)
            .to_std()
            .is_ok_and(|elapsed| elapsed > self.config.refresh_period)
    }

    /// Whether `visible` needs a fetch: nothing is loaded yet, it reaches
    /// past the loaded zone on any edge, or the loaded pins are stale.
    pub fn needs_fetch(&self, visible: &Bounds, now: DateTime<Utc>) -> bool {
        match (&self.current_zone, self.last_fetch) {
            (Some(zone), Some(last_fetch)) => {
                !zone.contains(visible) || self.is_stale(last_fetch, now)
            }
            _ => true,
        }
    }

    /// Decides whether to fetch for `visible`. When a fetch is due the loaded
    /// zone becomes the buffered region and a ticket for it is returned.
    pub fn begin(&mut self, visible: &Bounds, now: DateTime<Utc>) -> Option<FetchTicket> {
        if !self.needs_fetch(visible, now) {
            return None;
        }

        let zone = visible.buffer(self.config.buffer_factor);

        self.current_zone = Some(zone);
        self.last_fetch = Some(now);
        self.generation += 1;

        tracing::debug!(
            "loading pins for N {} S {} E {} W {}",
            zone.north,
            zone.south,
            zone.east,
            zone.west
        );

        Some(FetchTicket {
            generation: self.generation,
            bounds: zone,
        })
    }

    /// Applies the result of a fetch. Only the newest ticket is applied; a
    /// failure leaves the displayed markers as they were.
    pub fn complete(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<Pin>, Error>,
    ) -> Result<SyncOutcome, Error> {
        if ticket.generation != self.generation {
            tracing::debug!(
                "dropping pins from fetch {} superseded by {}",
                ticket.generation,
                self.generation
            );
            return Ok(SyncOutcome::Superseded);
        }

        let pins = result?;

        self.replace_markers(&pins);

        Ok(SyncOutcome::Applied(pins.len()))
    }

    fn replace_markers(&mut self, pins: &[Pin]) {
        for marker in self.markers.drain(..) {
            self.layer.remove_marker(marker);
        }

        let center = self.layer.center_longitude();

        self.markers = pins
            .iter()
            .map(|pin| {
                let position = Coordinate::new(
                    pin.location.latitude,
                    denormalize_longitude(pin.location.longitude, center),
                );
                self.layer.add_marker(position, (self.render)(pin))
            })
            .collect();
    }

    /// Handles a viewport change end to end for callers that wait for each
    /// fetch before reporting the next change.
    pub async fn on_viewport_changed<P: PinSource>(
        &mut self,
        source: &P,
        visible: &Bounds,
        now: DateTime<Utc>,
    ) -> Result<SyncOutcome, Error> {
        let Some(ticket) = self.begin(visible, now) else {
            return Ok(SyncOutcome::Unchanged);
        };

        let result = source.fetch_pins(ticket.bounds()).await;

        if let Err(e) = &result {
            tracing::error!("failed to load pins: {}", e);
        }

        self.complete(ticket, result)
    }
}
