//! Realtime passenger-flow simulation.
//!
//! Every station count is the product of a fixed base and a chain of
//! multipliers:
//!
//! | Stage | Source |
//! |-------|--------|
//! | time | [`crate::calendar::time_factor`] for the calendar mode |
//! | position | downward parabola over the station's position on the line |
//! | tier | [`StationTier::multiplier`] |
//! | event | largest matching [`SpecialEvent`] factor for today |
//! | line weight | static per-line ridership share |
//! | weather | [`Weather::factor`] |
//!
//! followed by a small deterministic jitter and a smoothing clamp against the
//! previous tick for the same `line-station` key. Every stage is clamped to a
//! finite, non-negative value before it enters the product.

use std::collections::{HashMap, HashSet};

use chrono::{NaiveDate, NaiveDateTime};
use log::debug;
use rand::distributions::{Distribution, WeightedIndex};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use crate::calendar::{is_off_service, time_factor, CalendarMode, PassengerTrend};
use crate::classifier::{StationClassifier, StationTier};
use crate::congestion::{CongestionLevel, LineCongestion};
use crate::error::{FlowError, FlowResult};
use crate::Line;

/// Ridership share per line. Unlisted lines weigh 1.0.
const LINE_WEIGHTS: [(&str, f64); 17] = [
    ("1号线", 1.5),
    ("2号线", 0.85),
    ("3号线", 1.2),
    ("4号线", 1.0),
    ("5号线", 1.45),
    ("6号线", 0.75),
    ("6号线支线", 0.02),
    ("7号线", 0.8),
    ("8号线", 0.12),
    ("9号线", 0.85),
    ("10号线", 0.75),
    ("11号线", 1.3),
    ("12号线", 0.8),
    ("13号线", 0.45),
    ("14号线", 0.9),
    ("16号线", 0.3),
    ("20号线", 0.05),
];

/// Whole-network base used by [`PassengerFlowSimulator::total_system_passengers`].
const SYSTEM_BASE_PASSENGERS: f64 = 3_000_000.0;

/// Line weight for `line_name`, 1.0 if the line is not in the table.
pub fn line_weight(line_name: &str) -> f64 {
    LINE_WEIGHTS
        .iter()
        .find(|(name, _)| *name == line_name)
        .map_or(1.0, |(_, w)| *w)
}

/// `clamp(-4 (pos - 0.5)^2 + 1, 0.5, 1.5)` with `pos = index / total`.
///
/// Termini see fewer passengers than the middle of the line.
pub fn position_factor(station_index: usize, total_stations: usize) -> f64 {
    if total_stations == 0 {
        return 1.0;
    }
    let pos = station_index as f64 / total_stations as f64;
    (-4.0 * (pos - 0.5).powi(2) + 1.0).clamp(0.5, 1.5)
}

/// Clamp a multiplier stage to a finite, non-negative value.
fn stage(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

// ============================================================================
// Configuration and inputs
// ============================================================================

/// Configuration for the simulator.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Passenger count at every multiplier = 1.
    /// Default: 2000.0
    pub base_passengers: f64,

    /// Half-width of the multiplicative jitter band.
    /// Default: 0.025 (draws from [0.975, 1.025])
    pub jitter: f64,

    /// Largest relative change allowed between consecutive samples of a station.
    /// Default: 0.05
    pub smoothing_ratio: f64,

    /// Seed for jitter and weather draws.
    /// Default: 42
    pub seed: u64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            base_passengers: 2000.0,
            jitter: 0.025,
            smoothing_ratio: 0.05,
            seed: 42,
        }
    }
}

/// Weather condition and its ridership impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Weather {
    Sunny,
    Cloudy,
    Overcast,
    LightRain,
    HeavyRain,
    Storm,
}

impl Weather {
    /// Candidates and weights for random draws. Storms are never drawn.
    const DRAW_TABLE: [(Weather, f64); 5] = [
        (Weather::Sunny, 0.4),
        (Weather::Cloudy, 0.3),
        (Weather::Overcast, 0.15),
        (Weather::LightRain, 0.1),
        (Weather::HeavyRain, 0.05),
    ];

    pub fn factor(&self) -> f64 {
        match self {
            Weather::Sunny => 1.0,
            Weather::Cloudy => 0.95,
            Weather::Overcast => 0.9,
            Weather::LightRain => 0.85,
            Weather::HeavyRain => 0.7,
            Weather::Storm => 0.5,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Weather::Sunny => "晴",
            Weather::Cloudy => "多云",
            Weather::Overcast => "阴",
            Weather::LightRain => "小雨",
            Weather::HeavyRain => "大雨",
            Weather::Storm => "暴雨",
        }
    }
}

/// Stations affected by a special event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventScope {
    /// Every station on every line
    All,
    Stations(HashSet<String>),
}

/// A dated ridership surge (concert, expo, match day).
#[derive(Debug, Clone, PartialEq)]
pub struct SpecialEvent {
    pub date: NaiveDate,
    pub scope: EventScope,
    /// Multiplier, always > 1
    pub factor: f64,
}

impl SpecialEvent {
    pub fn new(date: NaiveDate, scope: EventScope, factor: f64) -> FlowResult<Self> {
        if !factor.is_finite() || factor <= 1.0 {
            return Err(FlowError::InvalidEvent(format!(
                "factor must be a finite value above 1, got {}",
                factor
            )));
        }
        if let EventScope::Stations(stations) = &scope {
            if stations.is_empty() {
                return Err(FlowError::InvalidEvent("no stations given".to_string()));
            }
        }
        Ok(Self { date, scope, factor })
    }

    /// Event covering the named stations.
    pub fn at_stations<I, S>(date: NaiveDate, stations: I, factor: f64) -> FlowResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stations = stations.into_iter().map(Into::into).collect();
        Self::new(date, EventScope::Stations(stations), factor)
    }

    pub fn affects(&self, date: NaiveDate, station_name: &str) -> bool {
        self.date == date
            && match &self.scope {
                EventScope::All => true,
                EventScope::Stations(stations) => stations.contains(station_name),
            }
    }
}

/// Identifies the station being sampled.
#[derive(Debug, Clone, Copy)]
pub struct StationQuery<'a> {
    pub station_name: &'a str,
    pub line_name: &'a str,
    pub station_index: usize,
    pub total_stations: usize,
}

// ============================================================================
// Output
// ============================================================================

/// One station's simulated count for one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationFlowSample {
    pub station_name: String,
    pub line_name: String,
    pub passengers: u32,
    pub congestion: CongestionLevel,
    pub is_off_service: bool,
    pub trend: PassengerTrend,
    pub updated_at: NaiveDateTime,
}

/// A station at one end of a line's passenger ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationExtreme {
    pub station_name: String,
    pub passengers: u32,
}

/// Aggregates over one line's samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineStats {
    pub total: u64,
    pub avg: u32,
    pub max: u32,
    pub min: u32,
    pub congestion: LineCongestion,
    pub busiest: Option<StationExtreme>,
    pub quietest: Option<StationExtreme>,
    pub station_count: usize,
}

impl LineStats {
    /// Ties go to the earliest station.
    pub fn from_samples(samples: &[StationFlowSample]) -> Self {
        let busiest = samples
            .iter()
            .fold(None::<&StationFlowSample>, |best, s| match best {
                Some(b) if b.passengers >= s.passengers => Some(b),
                _ => Some(s),
            });
        let quietest = samples
            .iter()
            .fold(None::<&StationFlowSample>, |best, s| match best {
                Some(b) if b.passengers <= s.passengers => Some(b),
                _ => Some(s),
            });

        let (Some(busiest), Some(quietest)) = (busiest, quietest) else {
            return Self {
                total: 0,
                avg: 0,
                max: 0,
                min: 0,
                congestion: LineCongestion::Unknown,
                busiest: None,
                quietest: None,
                station_count: 0,
            };
        };

        let total: u64 = samples.iter().map(|s| u64::from(s.passengers)).sum();
        let avg = (total as f64 / samples.len() as f64).round() as u32;

        Self {
            total,
            avg,
            max: busiest.passengers,
            min: quietest.passengers,
            congestion: LineCongestion::from_average(avg),
            busiest: Some(StationExtreme {
                station_name: busiest.station_name.clone(),
                passengers: busiest.passengers,
            }),
            quietest: Some(StationExtreme {
                station_name: quietest.station_name.clone(),
                passengers: quietest.passengers,
            }),
            station_count: samples.len(),
        }
    }
}

// ============================================================================
// Simulator
// ============================================================================

/// Passenger-flow simulator owning its smoothing state, events and RNG.
///
/// Smoothing state lives as long as the simulator; it is keyed by
/// `"{line}-{station}"` and only bounds the next sample of the same key.
pub struct PassengerFlowSimulator {
    config: SimulatorConfig,
    rng: ChaCha8Rng,
    previous: HashMap<String, u32>,
    events: Vec<SpecialEvent>,
    weather: Weather,
}

impl PassengerFlowSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            previous: HashMap::new(),
            events: Vec::new(),
            weather: Weather::Sunny,
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn weather(&self) -> Weather {
        self.weather
    }

    pub fn set_weather(&mut self, weather: Weather) {
        self.weather = weather;
    }

    /// Draw a new weather condition from the weighted table.
    pub fn randomize_weather(&mut self) -> Weather {
        let weights = Weather::DRAW_TABLE.map(|(_, w)| w);
        self.weather = match WeightedIndex::new(weights) {
            Ok(dist) => Weather::DRAW_TABLE[dist.sample(&mut self.rng)].0,
            Err(_) => Weather::Sunny,
        };
        debug!("[Simulator] Weather is now {}", self.weather.label());
        self.weather
    }

    /// Register a special event. Events are never removed.
    pub fn add_event(&mut self, event: SpecialEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[SpecialEvent] {
        &self.events
    }

    /// Largest factor among today's events covering the station, 1.0 if none.
    pub fn event_factor(&self, station_name: &str, date: NaiveDate) -> f64 {
        self.events
            .iter()
            .filter(|e| e.affects(date, station_name))
            .map(|e| e.factor)
            .fold(1.0, f64::max)
    }

    /// Value the next sample for this key will be clamped against.
    pub fn previous(&self, line_name: &str, station_name: &str) -> Option<u32> {
        self.previous.get(&smoothing_key(line_name, station_name)).copied()
    }

    /// Simulate one station.
    ///
    /// During closed hours this returns an off-service sample and leaves the
    /// smoothing state untouched.
    pub fn compute_sample(
        &mut self,
        query: &StationQuery<'_>,
        now: NaiveDateTime,
        mode: CalendarMode,
        tier: StationTier,
    ) -> StationFlowSample {
        if is_off_service(now) {
            return StationFlowSample {
                station_name: query.station_name.to_string(),
                line_name: query.line_name.to_string(),
                passengers: 0,
                congestion: CongestionLevel::OffService,
                is_off_service: true,
                trend: PassengerTrend::at(now),
                updated_at: now,
            };
        }

        let raw = (stage(self.config.base_passengers)
            * stage(time_factor(now, mode))
            * stage(position_factor(query.station_index, query.total_stations))
            * stage(tier.multiplier())
            * stage(self.event_factor(query.station_name, now.date()))
            * stage(line_weight(query.line_name))
            * stage(self.weather.factor()))
        .round();

        let jitter = self.draw_jitter();
        let passengers = to_count(raw * jitter);
        let passengers = self.smooth(query.line_name, query.station_name, passengers);

        StationFlowSample {
            station_name: query.station_name.to_string(),
            line_name: query.line_name.to_string(),
            passengers,
            congestion: CongestionLevel::classify(passengers),
            is_off_service: false,
            trend: PassengerTrend::at(now),
            updated_at: now,
        }
    }

    /// Simulate every station of a line, in line order.
    pub fn simulate_line(
        &mut self,
        line: &Line,
        classifier: &StationClassifier,
        now: NaiveDateTime,
        mode: CalendarMode,
    ) -> Vec<StationFlowSample> {
        let total_stations = line.stations.len();
        let samples: Vec<StationFlowSample> = line
            .stations
            .iter()
            .enumerate()
            .map(|(station_index, station_name)| {
                let query = StationQuery {
                    station_name,
                    line_name: &line.name,
                    station_index,
                    total_stations,
                };
                self.compute_sample(&query, now, mode, classifier.classify(station_name))
            })
            .collect();

        debug!(
            "[Simulator] {} samples for {} at {} ({:?})",
            samples.len(),
            line.name,
            now,
            mode
        );
        samples
    }

    /// Whole-network passenger estimate.
    pub fn total_system_passengers(&self, now: NaiveDateTime, mode: CalendarMode) -> u64 {
        let weekend_factor = if mode.is_weekend() { 1.1 } else { 1.0 };
        let total = SYSTEM_BASE_PASSENGERS
            * stage(time_factor(now, mode))
            * stage(self.weather.factor())
            * weekend_factor;
        total.round().max(0.0) as u64
    }

    fn draw_jitter(&mut self) -> f64 {
        let half_width = stage(self.config.jitter).min(1.0);
        if half_width == 0.0 {
            return 1.0;
        }
        self.rng.gen_range((1.0 - half_width)..=(1.0 + half_width))
    }

    /// Clamp against the previous value for the key and remember the result.
    fn smooth(&mut self, line_name: &str, station_name: &str, passengers: u32) -> u32 {
        let key = smoothing_key(line_name, station_name);
        let ratio = stage(self.config.smoothing_ratio);

        let smoothed = match self.previous.get(&key) {
            // A zero prior would pin the station at zero forever
            Some(&prior) if prior > 0 => {
                let delta = (prior as f64 * ratio).ceil() as u32;
                passengers.clamp(prior.saturating_sub(delta), prior.saturating_add(delta))
            }
            _ => passengers,
        };

        self.previous.insert(key, smoothed);
        smoothed
    }
}

impl Default for PassengerFlowSimulator {
    fn default() -> Self {
        Self::new(SimulatorConfig::default())
    }
}

fn smoothing_key(line_name: &str, station_name: &str) -> String {
    format!("{}-{}", line_name, station_name)
}

/// Round a product to a passenger count, clamping NaN and negatives to 0.
fn to_count(value: f64) -> u32 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    value.round().min(u32::MAX as f64) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn query<'a>(station: &'a str, line: &'a str, index: usize, total: usize) -> StationQuery<'a> {
        StationQuery {
            station_name: station,
            line_name: line,
            station_index: index,
            total_stations: total,
        }
    }

    #[test]
    fn test_off_service_hours() {
        let mut sim = PassengerFlowSimulator::default();
        for hour in 0..6 {
            let sample = sim.compute_sample(
                &query("老街", "1号线", 3, 10),
                at(2025, 3, 12, hour, 15),
                CalendarMode::Weekday,
                StationTier::T1,
            );
            assert_eq!(sample.passengers, 0);
            assert!(sample.is_off_service);
            assert_eq!(sample.congestion, CongestionLevel::OffService);
        }
        assert_eq!(sim.previous("1号线", "老街"), None);
    }

    #[test]
    fn test_position_factor_peaks_mid_line() {
        let total = 10;
        let factors: Vec<f64> = (0..total).map(|i| position_factor(i, total)).collect();
        assert!(factors.iter().all(|f| (0.5..=1.5).contains(f)));

        let best = factors
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(best, total / 2);
        assert_eq!(position_factor(0, total), 0.5);
    }

    #[test]
    fn test_peak_versus_off_peak() {
        // 5号线, 10 stations, index 4, T1, Wednesday
        let q = query("布心", "5号线", 4, 10);

        let mut peak_sim = PassengerFlowSimulator::default();
        let peak = peak_sim.compute_sample(
            &q,
            at(2025, 3, 12, 8, 15),
            CalendarMode::Weekday,
            StationTier::T1,
        );

        let mut off_sim = PassengerFlowSimulator::default();
        let off = off_sim.compute_sample(
            &q,
            at(2025, 3, 12, 14, 30),
            CalendarMode::Weekday,
            StationTier::T1,
        );

        let ratio = peak.passengers as f64 / off.passengers as f64;
        assert!((2.0..=4.0).contains(&ratio), "ratio was {}", ratio);
        assert_eq!(peak.congestion, CongestionLevel::Jammed);
    }

    #[test]
    fn test_expected_magnitude() {
        let config = SimulatorConfig {
            jitter: 0.0,
            ..SimulatorConfig::default()
        };
        let mut sim = PassengerFlowSimulator::new(config);
        let sample = sim.compute_sample(
            &query("布心", "5号线", 4, 10),
            at(2025, 3, 12, 14, 30),
            CalendarMode::Weekday,
            StationTier::T1,
        );
        // 2000 * 0.4 * 0.96 * 2.5 * 1.45
        assert_eq!(sample.passengers, 2784);
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let mut sim = PassengerFlowSimulator::default();
        for _ in 0..1000 {
            let j = sim.draw_jitter();
            assert!((0.975..=1.025).contains(&j));
        }
    }

    #[test]
    fn test_same_seed_same_output() {
        let q = query("车公庙", "1号线", 12, 30);
        let now = at(2025, 3, 12, 18, 0);
        let mut a = PassengerFlowSimulator::default();
        let mut b = PassengerFlowSimulator::default();
        for _ in 0..5 {
            assert_eq!(
                a.compute_sample(&q, now, CalendarMode::Weekday, StationTier::T1).passengers,
                b.compute_sample(&q, now, CalendarMode::Weekday, StationTier::T1).passengers
            );
        }
    }

    #[test]
    fn test_smoothing_bounds_consecutive_ticks() {
        let mut sim = PassengerFlowSimulator::default();
        let q = query("福田", "1号线", 10, 30);

        let weekday = CalendarMode::Weekday;
        let first = sim.compute_sample(&q, at(2025, 3, 12, 14, 30), weekday, StationTier::T1);
        // Rush hour would nearly triple the count without smoothing
        let second = sim.compute_sample(&q, at(2025, 3, 12, 17, 30), weekday, StationTier::T1);

        let limit = (first.passengers as f64 * 0.05).ceil() as u32;
        assert_eq!(second.passengers, first.passengers + limit);
        assert_eq!(sim.previous("1号线", "福田"), Some(second.passengers));
    }

    #[test]
    fn test_off_service_keeps_previous() {
        let mut sim = PassengerFlowSimulator::default();
        let q = query("福田", "1号线", 10, 30);

        let weekday = CalendarMode::Weekday;
        let day = sim.compute_sample(&q, at(2025, 3, 12, 22, 0), weekday, StationTier::T1);
        sim.compute_sample(&q, at(2025, 3, 13, 2, 0), weekday, StationTier::T1);
        assert_eq!(sim.previous("1号线", "福田"), Some(day.passengers));
    }

    #[test]
    fn test_event_factor_takes_maximum_for_today() {
        let mut sim = PassengerFlowSimulator::default();
        let today = NaiveDate::from_ymd_opt(2025, 3, 12).unwrap();
        let tomorrow = NaiveDate::from_ymd_opt(2025, 3, 13).unwrap();

        sim.add_event(SpecialEvent::at_stations(today, ["会展中心"], 1.8).unwrap());
        sim.add_event(SpecialEvent::new(today, EventScope::All, 1.2).unwrap());
        sim.add_event(SpecialEvent::at_stations(tomorrow, ["会展中心"], 3.0).unwrap());

        assert_eq!(sim.event_factor("会展中心", today), 1.8);
        assert_eq!(sim.event_factor("罗湖", today), 1.2);
        assert_eq!(sim.event_factor("罗湖", NaiveDate::from_ymd_opt(2025, 3, 14).unwrap()), 1.0);
    }

    #[test]
    fn test_invalid_events_rejected() {
        let today = NaiveDate::from_ymd_opt(2025, 3, 12).unwrap();
        assert!(SpecialEvent::new(today, EventScope::All, 0.8).is_err());
        assert!(SpecialEvent::new(today, EventScope::All, f64::NAN).is_err());
        assert!(SpecialEvent::at_stations(today, Vec::<String>::new(), 2.0).is_err());
    }

    #[test]
    fn test_unknown_line_weighs_one() {
        assert_eq!(line_weight("99号线"), 1.0);
        assert_eq!(line_weight("5号线"), 1.45);
    }

    #[test]
    fn test_weather_scales_counts() {
        let config = SimulatorConfig {
            jitter: 0.0,
            ..SimulatorConfig::default()
        };
        let q = query("华强北", "2号线", 5, 10);
        let now = at(2025, 3, 12, 14, 30);

        let mut sunny = PassengerFlowSimulator::new(config.clone());
        let mut rainy = PassengerFlowSimulator::new(config);
        rainy.set_weather(Weather::HeavyRain);

        let a = sunny.compute_sample(&q, now, CalendarMode::Weekday, StationTier::T2);
        let b = rainy.compute_sample(&q, now, CalendarMode::Weekday, StationTier::T2);
        assert_eq!(b.passengers, (a.passengers as f64 * 0.7).round() as u32);
    }

    #[test]
    fn test_randomized_weather_is_drawable() {
        let mut sim = PassengerFlowSimulator::default();
        for _ in 0..50 {
            assert_ne!(sim.randomize_weather(), Weather::Storm);
        }
    }

    #[test]
    fn test_line_stats() {
        let now = at(2025, 3, 12, 10, 0);
        let sample = |name: &str, passengers: u32| StationFlowSample {
            station_name: name.to_string(),
            line_name: "1号线".to_string(),
            passengers,
            congestion: CongestionLevel::classify(passengers),
            is_off_service: false,
            trend: PassengerTrend::at(now),
            updated_at: now,
        };

        let stats = LineStats::from_samples(&[
            sample("罗湖", 300),
            sample("国贸", 900),
            sample("老街", 900),
            sample("大剧院", 100),
        ]);
        assert_eq!(stats.total, 2200);
        assert_eq!(stats.avg, 550);
        assert_eq!(stats.busiest.unwrap().station_name, "国贸");
        assert_eq!(stats.quietest.unwrap().station_name, "大剧院");
        assert_eq!(stats.congestion, LineCongestion::Normal);

        let empty = LineStats::from_samples(&[]);
        assert_eq!(empty.congestion, LineCongestion::Unknown);
        assert!(empty.busiest.is_none());
    }

    #[test]
    fn test_system_total() {
        let sim = PassengerFlowSimulator::default();
        let night = sim.total_system_passengers(at(2025, 3, 12, 3, 0), CalendarMode::Weekday);
        assert_eq!(night, 0);
        // 3M * 0.8 * 1.1 on a weekend afternoon
        let weekend = sim.total_system_passengers(at(2025, 3, 15, 13, 0), CalendarMode::Weekend);
        assert_eq!(weekend, 2_640_000);
    }
}
