//! Congestion classification.
//!
//! Station buckets come from a fixed ascending threshold table with inclusive
//! upper bounds; the last bucket catches everything above the table.

use serde::Serialize;

/// Congestion bucket for a single station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum CongestionLevel {
    OffService,
    Clear,
    Comfortable,
    Busy,
    Crowded,
    Jammed,
}

/// `(inclusive upper bound, level)`, strictly increasing.
const STATION_THRESHOLDS: [(u32, CongestionLevel); 5] = [
    (0, CongestionLevel::OffService),
    (200, CongestionLevel::Clear),
    (500, CongestionLevel::Comfortable),
    (1000, CongestionLevel::Busy),
    (2000, CongestionLevel::Crowded),
];

impl CongestionLevel {
    /// Every bucket in ascending order, for legends.
    pub const ALL: [CongestionLevel; 6] = [
        CongestionLevel::OffService,
        CongestionLevel::Clear,
        CongestionLevel::Comfortable,
        CongestionLevel::Busy,
        CongestionLevel::Crowded,
        CongestionLevel::Jammed,
    ];

    /// Classify a passenger count. `passengers <= threshold` picks the first bucket.
    pub fn classify(passengers: u32) -> Self {
        STATION_THRESHOLDS
            .iter()
            .find(|(upper, _)| passengers <= *upper)
            .map(|(_, level)| *level)
            .unwrap_or(CongestionLevel::Jammed)
    }

    /// Display label.
    pub fn label(&self) -> &'static str {
        match self {
            CongestionLevel::OffService => "已停运",
            CongestionLevel::Clear => "畅通",
            CongestionLevel::Comfortable => "舒适",
            CongestionLevel::Busy => "繁忙",
            CongestionLevel::Crowded => "拥挤",
            CongestionLevel::Jammed => "拥堵",
        }
    }

    /// CSS colour for markers and legend swatches.
    pub fn color(&self) -> &'static str {
        match self {
            CongestionLevel::OffService => "#94a3b8",
            CongestionLevel::Clear => "#10b981",
            CongestionLevel::Comfortable => "#3b82f6",
            CongestionLevel::Busy => "#f59e0b",
            CongestionLevel::Crowded => "#ef4444",
            CongestionLevel::Jammed => "#dc2626",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            CongestionLevel::OffService => "🌙",
            CongestionLevel::Clear | CongestionLevel::Comfortable => "😊",
            CongestionLevel::Busy => "😐",
            CongestionLevel::Crowded => "😰",
            CongestionLevel::Jammed => "😱",
        }
    }
}

/// Congestion summary for a whole line, from its average station count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum LineCongestion {
    Unknown,
    VerySmooth,
    Smooth,
    Normal,
    Busy,
    Crowded,
    VeryCrowded,
}

impl LineCongestion {
    /// Thresholds are exclusive upper bounds on the average.
    pub fn from_average(avg_passengers: u32) -> Self {
        match avg_passengers {
            0..=199 => LineCongestion::VerySmooth,
            200..=399 => LineCongestion::Smooth,
            400..=599 => LineCongestion::Normal,
            600..=799 => LineCongestion::Busy,
            800..=999 => LineCongestion::Crowded,
            _ => LineCongestion::VeryCrowded,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            LineCongestion::Unknown => "未知",
            LineCongestion::VerySmooth => "非常畅通",
            LineCongestion::Smooth => "畅通",
            LineCongestion::Normal => "正常",
            LineCongestion::Busy => "繁忙",
            LineCongestion::Crowded => "拥挤",
            LineCongestion::VeryCrowded => "非常拥挤",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            LineCongestion::Unknown => "#999999",
            LineCongestion::VerySmooth => "#10b981",
            LineCongestion::Smooth => "#34d399",
            LineCongestion::Normal => "#3b82f6",
            LineCongestion::Busy => "#f59e0b",
            LineCongestion::Crowded => "#f97316",
            LineCongestion::VeryCrowded => "#ef4444",
        }
    }
}
