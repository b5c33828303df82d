//! Line directory ingest and station search.
//!
//! The directory is a JSON array of `{id, name, color, stations}` records read
//! once at startup. A missing or empty directory is terminal for the view: the
//! caller shows an error message and never starts the simulator.

use std::path::Path;

use log::{error, info};
use serde::Serialize;

use crate::error::{LoadError, LoadResult};
use crate::Line;

/// Parse a line directory from JSON text.
///
/// Station entries are normalized on the way in (see [`crate::StationRef`]).
/// An empty array is reported as [`LoadError::Empty`].
pub fn parse_lines(json: &str) -> LoadResult<Vec<Line>> {
    let lines: Vec<Line> = serde_json::from_str(json)?;
    if lines.is_empty() {
        return Err(LoadError::Empty);
    }
    info!("[Lines] Loaded {} lines", lines.len());
    Ok(lines)
}

/// Read and parse a line directory from disk.
pub fn load_lines(path: impl AsRef<Path>) -> LoadResult<Vec<Line>> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_lines(&text)
}

/// Read a line directory, degrading any failure to an empty directory.
///
/// The failure is logged; callers check for an empty result and display their
/// own error state.
pub fn load_lines_or_empty(path: impl AsRef<Path>) -> Vec<Line> {
    match load_lines(path.as_ref()) {
        Ok(lines) => lines,
        Err(e) => {
            error!("[Lines] Failed to load {}: {}", path.as_ref().display(), e);
            Vec::new()
        }
    }
}

/// Fetch a line directory from a static HTTP source.
#[cfg(feature = "http")]
pub async fn fetch_lines(url: &str) -> LoadResult<Vec<Line>> {
    let response = reqwest::get(url)
        .await
        .map_err(|e| LoadError::Http(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(LoadError::Http(format!("HTTP {}", status)));
    }

    let body = response
        .text()
        .await
        .map_err(|e| LoadError::Http(e.to_string()))?;
    parse_lines(&body)
}

/// A station found by [`search_stations`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationMatch {
    pub station: String,
    pub line_name: String,
    pub line_color: String,
}

/// Find every station whose name contains `query`, on every line serving it.
///
/// Results keep directory order (line order, then station order). A blank query
/// matches nothing.
pub fn search_stations(lines: &[Line], query: &str) -> Vec<StationMatch> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }

    lines
        .iter()
        .flat_map(|line| {
            line.stations
                .iter()
                .filter(move |station| station.contains(query))
                .map(move |station| StationMatch {
                    station: station.clone(),
                    line_name: line.name.clone(),
                    line_color: line.color.clone(),
                })
        })
        .collect()
}
