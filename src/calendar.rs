//! Temporal demand patterns.
//!
//! Each calendar mode has its own table of half-open `[start, end)` time windows,
//! each carrying a demand multiplier. Windows may wrap across midnight. The
//! hours before 06:00 are a closed-service fast path that never reaches a table.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike, Weekday};
use serde::Serialize;

use crate::holiday::HolidayInfo;

/// First hour of passenger service.
pub const SERVICE_START_HOUR: u32 = 6;

/// Hour at which the last trains have left.
pub const SERVICE_END_HOUR: u32 = 23;

/// Multiplier used when no window covers the current minute.
const DEFAULT_FACTOR: f64 = 0.5;

/// Weekday rush hours get this boost on top of the table value.
const WEEKDAY_PEAK_BOOST: f64 = 1.2;

/// Holiday names that select the spring-festival table.
const SPRING_FESTIVAL_MARKERS: [&str; 3] = ["春节", "除夕", "初"];

/// Which demand table applies to a date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CalendarMode {
    Weekday,
    Weekend,
    Holiday,
    SpringFestival,
}

impl CalendarMode {
    /// Pick the mode for a date given what the holiday resolver reported.
    ///
    /// Spring festival beats any other holiday, a holiday beats a weekend.
    pub fn resolve(date: NaiveDate, holiday: &HolidayInfo) -> Self {
        if holiday.is_holiday {
            let spring_festival = holiday
                .holiday_name
                .as_deref()
                .is_some_and(|name| SPRING_FESTIVAL_MARKERS.iter().any(|m| name.contains(m)));
            if spring_festival {
                CalendarMode::SpringFestival
            } else {
                CalendarMode::Holiday
            }
        } else if is_weekend(date) {
            CalendarMode::Weekend
        } else {
            CalendarMode::Weekday
        }
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self, CalendarMode::Weekend)
    }

    fn table(&self) -> &'static [TimeWindow] {
        match self {
            CalendarMode::Weekday => &WEEKDAY,
            CalendarMode::Weekend => &WEEKEND,
            CalendarMode::Holiday => &HOLIDAY,
            CalendarMode::SpringFestival => &SPRING_FESTIVAL,
        }
    }
}

/// Saturday or Sunday.
pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// True during the closed-service hours `[00:00, 06:00)`.
pub fn is_off_service(now: NaiveDateTime) -> bool {
    now.hour() < SERVICE_START_HOUR
}

// ============================================================================
// Pattern tables
// ============================================================================

/// A half-open window of minutes since midnight.
#[derive(Debug, Clone, Copy)]
struct TimeWindow {
    start: u32,
    end: u32,
    factor: f64,
}

impl TimeWindow {
    const fn new(start_h: u32, start_m: u32, end_h: u32, end_m: u32, factor: f64) -> Self {
        Self {
            start: start_h * 60 + start_m,
            end: end_h * 60 + end_m,
            factor,
        }
    }

    fn contains(&self, minute_of_day: u32) -> bool {
        if self.start < self.end {
            minute_of_day >= self.start && minute_of_day < self.end
        } else {
            // Wraps past midnight
            minute_of_day >= self.start || minute_of_day < self.end
        }
    }
}

const WEEKDAY: [TimeWindow; 11] = [
    TimeWindow::new(6, 0, 6, 30, 0.2),
    TimeWindow::new(6, 30, 7, 0, 0.4),
    TimeWindow::new(7, 0, 9, 0, 0.9), // morning rush
    TimeWindow::new(9, 0, 9, 30, 0.6),
    TimeWindow::new(9, 30, 11, 30, 0.4),
    TimeWindow::new(11, 30, 13, 30, 0.6),
    TimeWindow::new(13, 30, 17, 0, 0.4),
    TimeWindow::new(17, 0, 19, 0, 0.9), // evening rush
    TimeWindow::new(19, 0, 21, 30, 0.6),
    TimeWindow::new(21, 30, 23, 0, 0.3),
    TimeWindow::new(23, 0, 6, 0, 0.1),
];

const WEEKEND: [TimeWindow; 7] = [
    TimeWindow::new(6, 0, 9, 0, 0.2),
    TimeWindow::new(9, 0, 12, 0, 0.7),
    TimeWindow::new(12, 0, 17, 0, 0.8),
    TimeWindow::new(17, 0, 20, 0, 0.6),
    TimeWindow::new(20, 0, 22, 0, 0.4),
    TimeWindow::new(22, 0, 23, 30, 0.1),
    TimeWindow::new(23, 30, 6, 0, 0.05),
];

const HOLIDAY: [TimeWindow; 7] = [
    TimeWindow::new(6, 0, 9, 0, 0.25),
    TimeWindow::new(9, 0, 11, 30, 0.8),
    TimeWindow::new(11, 30, 17, 30, 1.0),
    TimeWindow::new(17, 30, 20, 30, 0.85),
    TimeWindow::new(20, 30, 22, 30, 0.5),
    TimeWindow::new(22, 30, 23, 30, 0.2),
    TimeWindow::new(23, 30, 6, 0, 0.1),
];

// Residents leave the city over lunar new year
const SPRING_FESTIVAL: [TimeWindow; 6] = [
    TimeWindow::new(6, 0, 9, 0, 0.1),
    TimeWindow::new(9, 0, 12, 0, 0.3),
    TimeWindow::new(12, 0, 18, 0, 0.4),
    TimeWindow::new(18, 0, 21, 0, 0.3),
    TimeWindow::new(21, 0, 23, 0, 0.1),
    TimeWindow::new(23, 0, 6, 0, 0.05),
];

/// Demand multiplier for a moment, `>= 0`.
///
/// Closed hours return 0 without consulting any table. The weekday rush boost
/// is applied after the table lookup.
pub fn time_factor(now: NaiveDateTime, mode: CalendarMode) -> f64 {
    let hour = now.hour();
    if hour < SERVICE_START_HOUR {
        return 0.0;
    }

    let minute_of_day = hour * 60 + now.minute();
    let mut factor = mode
        .table()
        .iter()
        .find(|w| w.contains(minute_of_day))
        .map_or(DEFAULT_FACTOR, |w| w.factor);

    if mode == CalendarMode::Weekday && is_rush_hour(hour) {
        factor *= WEEKDAY_PEAK_BOOST;
    }

    factor
}

fn is_rush_hour(hour: u32) -> bool {
    (7..9).contains(&hour) || (17..19).contains(&hour)
}

// ============================================================================
// Trend and service status
// ============================================================================

/// Direction passenger numbers are heading at this hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PassengerTrend {
    RisingFast,
    PeakRising,
    Easing,
    Steady,
    RisingSlowly,
    Low,
}

impl PassengerTrend {
    pub fn at(now: NaiveDateTime) -> Self {
        match now.hour() {
            5..=6 => PassengerTrend::RisingFast,
            7..=8 | 17..=18 => PassengerTrend::PeakRising,
            9..=11 | 19..=21 => PassengerTrend::Easing,
            12..=13 => PassengerTrend::Steady,
            14..=16 => PassengerTrend::RisingSlowly,
            _ => PassengerTrend::Low,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PassengerTrend::RisingFast => "快速上升",
            PassengerTrend::PeakRising => "高峰上升",
            PassengerTrend::Easing => "缓慢下降",
            PassengerTrend::Steady => "平稳",
            PassengerTrend::RisingSlowly => "缓慢上升",
            PassengerTrend::Low => "低位运行",
        }
    }
}

/// Network-wide service state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServiceStatus {
    Normal,
    NightClosed,
}

impl ServiceStatus {
    pub fn at(now: NaiveDateTime) -> Self {
        if (SERVICE_START_HOUR..SERVICE_END_HOUR).contains(&now.hour()) {
            ServiceStatus::Normal
        } else {
            ServiceStatus::NightClosed
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ServiceStatus::Normal => "正常运营",
            ServiceStatus::NightClosed => "夜间停运",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            ServiceStatus::Normal => "#10b981",
            ServiceStatus::NightClosed => "#64748b",
        }
    }
}

/// Per-line operating state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OperationStatus {
    Normal,
    LastTrainWindow,
    Closed,
}

impl OperationStatus {
    pub fn label(&self) -> &'static str {
        match self {
            OperationStatus::Normal => "正常运营",
            OperationStatus::LastTrainWindow => "末班车时段",
            OperationStatus::Closed => "已停运",
        }
    }
}

/// Operating summary shown next to a line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineOperationInfo {
    pub status: OperationStatus,
    /// Headway text, or the reopening time when closed
    pub next_train: String,
    /// Approximate route length, 1.5 km per station
    pub length_km: u32,
    pub station_count: usize,
    pub start_time: &'static str,
    pub end_time: &'static str,
}

impl LineOperationInfo {
    pub fn at(station_count: usize, now: NaiveDateTime) -> Self {
        let hour = now.hour();
        let (status, next_train) = if hour >= SERVICE_END_HOUR || hour < SERVICE_START_HOUR {
            (OperationStatus::Closed, "06:00")
        } else if hour >= 22 {
            (OperationStatus::LastTrainWindow, "10-15分钟")
        } else {
            (OperationStatus::Normal, "3分钟")
        };

        Self {
            status,
            next_train: next_train.to_string(),
            length_km: (station_count as f64 * 1.5).round() as u32,
            station_count,
            start_time: "06:00",
            end_time: "23:00",
        }
    }
}
