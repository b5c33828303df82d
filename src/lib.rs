//! # Metro Flow
//!
//! Simulated metro passenger flow and a rendering-agnostic heatmap for a
//! single line of stations.
//!
//! This library provides:
//! - A realtime passenger-flow simulator driven by time of day, calendar mode
//!   (weekday, weekend, holiday, spring festival), station tier, line weight,
//!   special events and tick-to-tick smoothing
//! - A holiday resolver with a per-date cache, in-flight coalescing and a static
//!   fallback table
//! - A heatmap layout engine, renderer and pointer state machine that draw through
//!   the [`render::DrawSurface`] trait instead of a specific canvas API
//!
//! ## Features
//!
//! - **`http`** - Enable the `reqwest` holiday transport and remote line fetch
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::NaiveDate;
//! use metro_flow::{
//!     parse_lines, CalendarMode, PassengerFlowSimulator, SimulatorConfig, StationClassifier,
//! };
//!
//! let lines = parse_lines(r##"[
//!     {"id": 1, "name": "1号线", "color": "#00a650", "stations": ["罗湖", "国贸", {"name": "老街"}]}
//! ]"##).unwrap();
//!
//! let classifier = StationClassifier::new(&lines);
//! let mut simulator = PassengerFlowSimulator::new(SimulatorConfig::default());
//! let now = NaiveDate::from_ymd_opt(2025, 3, 12).unwrap().and_hms_opt(8, 15, 0).unwrap();
//!
//! let samples = simulator.simulate_line(&lines[0], &classifier, now, CalendarMode::Weekday);
//! assert_eq!(samples.len(), 3);
//! assert!(samples.iter().all(|s| !s.is_off_service));
//! ```

use serde::{Deserialize, Serialize};

pub mod error;
pub use error::{FlowError, FlowResult, LoadError, LoadResult};

// Line directory ingest and station search
pub mod lines;
pub use lines::{load_lines, load_lines_or_empty, parse_lines, search_stations, StationMatch};

pub mod congestion;
pub use congestion::{CongestionLevel, LineCongestion};

// Temporal demand tables and calendar modes
pub mod calendar;
pub use calendar::{
    time_factor, CalendarMode, LineOperationInfo, OperationStatus, PassengerTrend,
    ServiceStatus,
};

pub mod holiday;
pub use holiday::{HolidayInfo, HolidayResolver, HolidayTransport, OfflineTransport};

#[cfg(feature = "http")]
pub use holiday::{HolidayConfig, HttpHolidayTransport};

pub mod classifier;
pub use classifier::{StationClassifier, StationTier};

// Realtime passenger-flow simulation
pub mod simulator;
pub use simulator::{
    EventScope, LineStats, PassengerFlowSimulator, SimulatorConfig, SpecialEvent,
    StationExtreme, StationFlowSample, StationQuery, Weather,
};

pub mod service;
pub use service::{FlowService, LineTicker, TickGuard, TickerConfig};

// Heatmap layout, drawing and pointer handling
pub mod layout;
pub use layout::{
    CanvasSize, HeatmapConfig, HeatmapLayoutEngine, HeatmapPalette, LabelPlacement, Padding,
    StationPosition,
};

pub mod render;
pub use render::{
    CommandRecorder, DrawCommand, DrawSurface, FlowStats, HeatmapRenderer, TextAlign,
    TextBaseline, TextStyle,
};

pub mod interaction;
pub use interaction::{
    place_tooltip, InteractionOutcome, PointerInteractionResolver, PointerState,
    TooltipContent,
};

pub mod view;
pub use view::HeatmapView;

// ============================================================================
// Core Types
// ============================================================================

/// A station entry as it appears in the raw line directory.
///
/// The directory mixes bare names and objects carrying a `name`; anything else
/// is kept so it can be repaired instead of failing the whole load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StationRef {
    Name(String),
    Record { name: Option<String> },
    Other(serde_json::Value),
}

impl StationRef {
    /// Canonical station name, or `站点N` (1-based) when the entry carries none.
    pub fn normalize(&self, index: usize) -> String {
        let name = match self {
            StationRef::Name(name) => Some(name.trim()),
            StationRef::Record { name } => name.as_deref().map(str::trim),
            StationRef::Other(_) => None,
        };

        match name {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => {
                log::warn!("[Lines] Station #{} has no usable name: {:?}", index + 1, self);
                placeholder_station_name(index)
            }
        }
    }
}

/// Placeholder for a station whose name is missing or malformed.
pub fn placeholder_station_name(index: usize) -> String {
    format!("站点{}", index + 1)
}

#[derive(Debug, Deserialize)]
struct RawLine {
    id: i64,
    name: String,
    #[serde(default)]
    color: String,
    #[serde(default)]
    stations: Vec<StationRef>,
}

/// A metro line with its ordered, normalized station names.
///
/// Immutable after load. Station entries are normalized on ingest so nothing
/// downstream ever branches on the raw shape again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawLine")]
pub struct Line {
    pub id: i64,
    pub name: String,
    /// CSS colour string
    pub color: String,
    pub stations: Vec<String>,
}

impl From<RawLine> for Line {
    fn from(raw: RawLine) -> Self {
        let stations = raw
            .stations
            .iter()
            .enumerate()
            .map(|(i, station)| station.normalize(i))
            .collect();

        Self {
            id: raw.id,
            name: raw.name,
            color: raw.color,
            stations,
        }
    }
}

impl Line {
    /// Check whether this line serves the named station.
    pub fn serves(&self, station_name: &str) -> bool {
        self.stations.iter().any(|s| s == station_name)
    }

    /// Position of the named station along the line.
    pub fn station_index(&self, station_name: &str) -> Option<usize> {
        self.stations.iter().position(|s| s == station_name)
    }
}

// ============================================================================
// Tests
// ============================================================================
