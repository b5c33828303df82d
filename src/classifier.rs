//! Station tiers by the number of lines serving a station.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::Line;

/// Station importance tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StationTier {
    /// Three or more lines
    T1,
    /// Two lines
    T2,
    /// One line, or unknown
    T3,
}

impl StationTier {
    pub fn from_line_count(line_count: usize) -> Self {
        match line_count {
            n if n >= 3 => StationTier::T1,
            2 => StationTier::T2,
            _ => StationTier::T3,
        }
    }

    /// Passenger multiplier consumed by the simulator.
    pub fn multiplier(&self) -> f64 {
        match self {
            StationTier::T1 => 2.5,
            StationTier::T2 => 1.5,
            StationTier::T3 => 1.0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StationTier::T1 => "一级",
            StationTier::T2 => "二级",
            StationTier::T3 => "三级",
        }
    }
}

/// Pre-computed line counts for every station in the roster.
///
/// Built once from the full line directory; each line counts at most once per
/// station even if it lists the station twice (loop lines).
#[derive(Debug, Clone, Default)]
pub struct StationClassifier {
    line_counts: HashMap<String, usize>,
}

impl StationClassifier {
    pub fn new(lines: &[Line]) -> Self {
        let mut line_counts: HashMap<String, usize> = HashMap::new();
        for line in lines {
            let unique: HashSet<&str> = line.stations.iter().map(String::as_str).collect();
            for station in unique {
                *line_counts.entry(station.to_string()).or_insert(0) += 1;
            }
        }
        Self { line_counts }
    }

    /// Number of distinct lines serving the station.
    pub fn line_count(&self, station_name: &str) -> usize {
        self.line_counts.get(station_name.trim()).copied().unwrap_or(0)
    }

    pub fn classify(&self, station_name: &str) -> StationTier {
        StationTier::from_line_count(self.line_count(station_name))
    }
}

/// Classify one station against a roster without keeping an index.
pub fn classify(station_name: &str, lines: &[Line]) -> StationTier {
    let name = station_name.trim();
    let count = lines.iter().filter(|line| line.serves(name)).count();
    StationTier::from_line_count(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: i64, stations: &[&str]) -> Line {
        Line {
            id,
            name: format!("{}号线", id),
            color: "#000000".to_string(),
            stations: stations.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn roster() -> Vec<Line> {
        vec![
            line(1, &["罗湖", "大剧院", "车公庙"]),
            line(2, &["大剧院", "车公庙"]),
            line(7, &["车公庙", "华强北"]),
            line(9, &["车公庙"]),
            line(5, &["黄贝岭", "太安", "黄贝岭"]),
        ]
    }

    #[test]
    fn test_tiers_by_line_count() {
        let classifier = StationClassifier::new(&roster());
        assert_eq!(classifier.classify("车公庙"), StationTier::T1);
        assert_eq!(classifier.classify("大剧院"), StationTier::T2);
        assert_eq!(classifier.classify("罗湖"), StationTier::T3);
        assert_eq!(classifier.classify("不存在"), StationTier::T3);
    }

    #[test]
    fn test_repeated_station_counts_once() {
        let classifier = StationClassifier::new(&roster());
        assert_eq!(classifier.line_count("黄贝岭"), 1);
    }

    #[test]
    fn test_index_agrees_with_direct_scan() {
        let lines = roster();
        let classifier = StationClassifier::new(&lines);
        for name in ["罗湖", "大剧院", "车公庙", "华强北", "黄贝岭", "未知"] {
            assert_eq!(classifier.classify(name), classify(name, &lines));
        }
    }

    #[test]
    fn test_multipliers() {
        assert_eq!(StationTier::T1.multiplier(), 2.5);
        assert_eq!(StationTier::T2.multiplier(), 1.5);
        assert_eq!(StationTier::T3.multiplier(), 1.0);
    }
}
