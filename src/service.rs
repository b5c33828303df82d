//! Flow service: the line directory, holiday resolver and simulator behind one
//! owner, plus the periodic refresh for the active line.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use log::{debug, info, warn};
use tokio::time::MissedTickBehavior;

use crate::calendar::{CalendarMode, LineOperationInfo};
use crate::classifier::StationClassifier;
use crate::error::{FlowError, FlowResult};
use crate::holiday::{HolidayResolver, HolidayTransport};
use crate::lines::{search_stations, StationMatch};
use crate::simulator::{
    LineStats, PassengerFlowSimulator, SimulatorConfig, SpecialEvent, StationFlowSample,
    StationQuery,
};
use crate::Line;

/// Owns all mutable simulation state for one process.
///
/// The smoothing history and the holiday cache live here instead of in
/// globals, so independent services (and tests) never share them.
pub struct FlowService<T: HolidayTransport> {
    lines: Vec<Line>,
    classifier: StationClassifier,
    holidays: HolidayResolver<T>,
    simulator: PassengerFlowSimulator,
}

impl<T: HolidayTransport> FlowService<T> {
    pub fn new(lines: Vec<Line>, transport: T, config: SimulatorConfig) -> Self {
        info!("[FlowService] Serving {} lines", lines.len());
        Self {
            classifier: StationClassifier::new(&lines),
            lines,
            holidays: HolidayResolver::new(transport),
            simulator: PassengerFlowSimulator::new(config),
        }
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn line(&self, line_id: i64) -> Option<&Line> {
        self.lines.iter().find(|l| l.id == line_id)
    }

    pub fn classifier(&self) -> &StationClassifier {
        &self.classifier
    }

    pub fn holidays(&self) -> &HolidayResolver<T> {
        &self.holidays
    }

    pub fn simulator(&self) -> &PassengerFlowSimulator {
        &self.simulator
    }

    pub fn simulator_mut(&mut self) -> &mut PassengerFlowSimulator {
        &mut self.simulator
    }

    pub fn add_event(&mut self, event: SpecialEvent) {
        info!(
            "[FlowService] Event on {} with factor {}",
            event.date, event.factor
        );
        self.simulator.add_event(event);
    }

    pub async fn calendar_mode(&self, now: NaiveDateTime) -> CalendarMode {
        self.holidays.calendar_mode(now.date()).await
    }

    /// One tick of samples for every station of a line.
    pub async fn sample_line(
        &mut self,
        line_id: i64,
        now: NaiveDateTime,
    ) -> FlowResult<Vec<StationFlowSample>> {
        let mode = self.calendar_mode(now).await;
        let line = self
            .lines
            .iter()
            .find(|l| l.id == line_id)
            .ok_or(FlowError::UnknownLine(line_id))?;

        Ok(self.simulator.simulate_line(line, &self.classifier, now, mode))
    }

    /// Samples for a station on every line that serves it.
    pub async fn sample_station(
        &mut self,
        station_name: &str,
        now: NaiveDateTime,
    ) -> Vec<StationFlowSample> {
        let mode = self.calendar_mode(now).await;
        let name = station_name.trim();
        let tier = self.classifier.classify(name);

        let mut samples = Vec::new();
        for line in &self.lines {
            let Some(station_index) = line.station_index(name) else {
                continue;
            };
            let query = StationQuery {
                station_name: name,
                line_name: &line.name,
                station_index,
                total_stations: line.stations.len(),
            };
            samples.push(self.simulator.compute_sample(&query, now, mode, tier));
        }

        debug!("[FlowService] {} lines serve {}", samples.len(), name);
        samples
    }

    pub async fn line_stats(&mut self, line_id: i64, now: NaiveDateTime) -> FlowResult<LineStats> {
        let samples = self.sample_line(line_id, now).await?;
        Ok(LineStats::from_samples(&samples))
    }

    pub fn line_operation_info(
        &self,
        line_id: i64,
        now: NaiveDateTime,
    ) -> FlowResult<LineOperationInfo> {
        let line = self.line(line_id).ok_or(FlowError::UnknownLine(line_id))?;
        Ok(LineOperationInfo::at(line.stations.len(), now))
    }

    pub async fn total_system_passengers(&self, now: NaiveDateTime) -> u64 {
        let mode = self.calendar_mode(now).await;
        self.simulator.total_system_passengers(now, mode)
    }

    pub fn search(&self, query: &str) -> Vec<StationMatch> {
        search_stations(&self.lines, query)
    }
}

// ============================================================================
// Periodic refresh
// ============================================================================

/// Configuration for [`LineTicker`].
#[derive(Debug, Clone)]
pub struct TickerConfig {
    /// Time between refreshes. Default: 1 second
    pub period: Duration,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_secs(1),
        }
    }
}

/// Periodic refresh for the active line.
///
/// Each [`LineTicker::activate`] starts a new generation; guards from older
/// generations turn stale, so at most one refresh loop writes results.
#[derive(Debug, Clone, Default)]
pub struct LineTicker {
    config: TickerConfig,
    generation: Arc<AtomicU64>,
}

/// Proof that a refresh loop belongs to the current selection.
#[derive(Debug, Clone)]
pub struct TickGuard {
    generation: Arc<AtomicU64>,
    id: u64,
}

impl TickGuard {
    pub fn is_current(&self) -> bool {
        self.generation.load(Ordering::SeqCst) == self.id
    }
}

impl LineTicker {
    pub fn new(config: TickerConfig) -> Self {
        Self {
            config,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Invalidate every outstanding guard and hand out a fresh one.
    pub fn activate(&self) -> TickGuard {
        let id = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("[LineTicker] Generation {}", id);
        TickGuard {
            generation: Arc::clone(&self.generation),
            id,
        }
    }

    /// Stop the current loop without starting another.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Refresh `line_id` every period until `guard` goes stale.
    ///
    /// The first tick fires immediately. A result computed while the guard
    /// went stale is dropped instead of delivered. Returns the number of
    /// delivered ticks.
    pub async fn run<T, C, F>(
        &self,
        service: &mut FlowService<T>,
        line_id: i64,
        guard: TickGuard,
        mut clock: C,
        mut on_tick: F,
    ) -> FlowResult<u64>
    where
        T: HolidayTransport,
        C: FnMut() -> NaiveDateTime,
        F: FnMut(Vec<StationFlowSample>),
    {
        let mut interval = tokio::time::interval(self.config.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut delivered = 0;

        info!("[LineTicker] Refreshing line {} every {:?}", line_id, self.config.period);

        loop {
            interval.tick().await;
            if !guard.is_current() {
                break;
            }

            let samples = service.sample_line(line_id, clock()).await?;
            if !guard.is_current() {
                warn!("[LineTicker] Dropping stale tick for line {}", line_id);
                break;
            }

            on_tick(samples);
            delivered += 1;
        }

        debug!("[LineTicker] Line {} stopped after {} ticks", line_id, delivered);
        Ok(delivered)
    }
}
