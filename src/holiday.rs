//! Holiday lookup with a per-date cache and a static fallback table.
//!
//! The resolver asks an external date-keyed service whether a day is a public
//! holiday. Any failure (transport error, malformed body, non-zero service code)
//! falls back to a fixed month-day table, and whatever answer was produced is
//! cached for the rest of the process. Concurrent lookups for the same uncached
//! date share one in-flight request.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OnceCell};

use crate::calendar::CalendarMode;
use crate::error::{FlowError, FlowResult};

/// `(first MMDD, last MMDD, name)`, both ends inclusive.
const FALLBACK_HOLIDAYS: [(u32, u32, &str); 6] = [
    (101, 101, "元旦"),
    (128, 204, "春节"),
    (404, 406, "清明节"),
    (501, 505, "劳动节"),
    (531, 602, "端午节"),
    (1001, 1008, "国庆节"),
];

/// Whether a date is a public holiday, and which one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayInfo {
    pub is_holiday: bool,
    /// `None` on work days
    pub holiday_name: Option<String>,
}

impl HolidayInfo {
    pub fn work_day() -> Self {
        Self {
            is_holiday: false,
            holiday_name: None,
        }
    }

    pub fn holiday(name: &str) -> Self {
        Self {
            is_holiday: true,
            holiday_name: Some(name.to_string()),
        }
    }

    /// Answer from the static month-day table.
    pub fn fallback(date: NaiveDate) -> Self {
        let mmdd = date.month() * 100 + date.day();
        FALLBACK_HOLIDAYS
            .iter()
            .find(|(first, last, _)| (*first..=*last).contains(&mmdd))
            .map_or_else(Self::work_day, |(_, _, name)| Self::holiday(name))
    }
}

/// Response body of the holiday service.
#[derive(Debug, Deserialize)]
struct HolidayApiResponse {
    code: i64,
    holiday: Option<ApiHoliday>,
}

#[derive(Debug, Deserialize)]
struct ApiHoliday {
    holiday: bool,
    name: String,
}

/// Interpret a service response body.
fn parse_response(body: &str) -> FlowResult<HolidayInfo> {
    let response: HolidayApiResponse = serde_json::from_str(body)?;
    if response.code != 0 {
        return Err(FlowError::ServiceStatus(response.code));
    }

    Ok(match response.holiday {
        Some(h) if h.holiday => HolidayInfo::holiday(&h.name),
        // Either an ordinary day or a make-up work day
        _ => HolidayInfo::work_day(),
    })
}

/// Fetches the raw holiday-service body for a date.
///
/// Implementations perform I/O only; interpretation and caching stay in
/// [`HolidayResolver`].
#[async_trait]
pub trait HolidayTransport: Send + Sync {
    async fn fetch(&self, date: NaiveDate) -> FlowResult<String>;
}

/// Transport for hosts without network access: every lookup uses the fallback table.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineTransport;

#[async_trait]
impl HolidayTransport for OfflineTransport {
    async fn fetch(&self, _date: NaiveDate) -> FlowResult<String> {
        Err(FlowError::Transport("offline".to_string()))
    }
}

/// Resolves dates to holiday information. Never fails.
pub struct HolidayResolver<T: HolidayTransport> {
    transport: T,
    cache: Mutex<HashMap<NaiveDate, Arc<OnceCell<HolidayInfo>>>>,
}

impl<T: HolidayTransport> HolidayResolver<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Holiday information for `date`.
    ///
    /// A cached answer is returned without I/O. Otherwise one lookup runs for the
    /// date, and concurrent callers for the same date wait on it.
    pub async fn resolve(&self, date: NaiveDate) -> HolidayInfo {
        let cell = {
            let mut cache = self.cache.lock().await;
            Arc::clone(cache.entry(date).or_default())
        };

        if let Some(info) = cell.get() {
            debug!("[HolidayResolver] Cache hit for {}", date);
            return info.clone();
        }

        cell.get_or_init(|| self.lookup(date)).await.clone()
    }

    /// Calendar mode for `date`.
    pub async fn calendar_mode(&self, date: NaiveDate) -> CalendarMode {
        let info = self.resolve(date).await;
        CalendarMode::resolve(date, &info)
    }

    /// Cached answer for `date`, if any.
    pub async fn cached(&self, date: NaiveDate) -> Option<HolidayInfo> {
        let cache = self.cache.lock().await;
        cache.get(&date).and_then(|cell| cell.get().cloned())
    }

    /// Number of dates with a settled answer.
    pub async fn cached_dates(&self) -> usize {
        let cache = self.cache.lock().await;
        cache.values().filter(|cell| cell.initialized()).count()
    }

    async fn lookup(&self, date: NaiveDate) -> HolidayInfo {
        debug!("[HolidayResolver] Cache miss for {}, querying service", date);

        let result = match self.transport.fetch(date).await {
            Ok(body) => parse_response(&body),
            Err(e) => Err(e),
        };

        match result {
            Ok(info) => info,
            Err(e) => {
                let info = HolidayInfo::fallback(date);
                warn!(
                    "[HolidayResolver] Lookup for {} failed ({}), using fallback table: {:?}",
                    date, e, info.holiday_name
                );
                info
            }
        }
    }
}

// ============================================================================
// HTTP transport
// ============================================================================

/// Settings for [`HttpHolidayTransport`].
#[cfg(feature = "http")]
#[derive(Debug, Clone)]
pub struct HolidayConfig {
    /// Base URL; the ISO date is appended.
    /// Default: `https://timor.tech/api/holiday/info/`
    pub endpoint: String,
    /// Whole-request timeout. Default: 5 seconds
    pub timeout: std::time::Duration,
}

#[cfg(feature = "http")]
impl Default for HolidayConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://timor.tech/api/holiday/info/".to_string(),
            timeout: std::time::Duration::from_secs(5),
        }
    }
}

/// Holiday lookups over HTTP.
#[cfg(feature = "http")]
pub struct HttpHolidayTransport {
    client: reqwest::Client,
    endpoint: String,
}

#[cfg(feature = "http")]
impl HttpHolidayTransport {
    pub fn new(config: HolidayConfig) -> FlowResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("metro-flow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FlowError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: config.endpoint,
        })
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl HolidayTransport for HttpHolidayTransport {
    async fn fetch(&self, date: NaiveDate) -> FlowResult<String> {
        let url = format!("{}{}", self.endpoint, date.format("%Y-%m-%d"));

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FlowError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FlowError::Transport(format!("HTTP {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| FlowError::Transport(format!("Body download error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Transport spy that counts calls and replays a canned body.
    struct SpyTransport {
        calls: Arc<AtomicU32>,
        body: Option<String>,
        delay: Duration,
    }

    impl SpyTransport {
        fn new(body: Option<&str>) -> (Self, Arc<AtomicU32>) {
            let calls = Arc::new(AtomicU32::new(0));
            let spy = Self {
                calls: Arc::clone(&calls),
                body: body.map(str::to_string),
                delay: Duration::ZERO,
            };
            (spy, calls)
        }
    }

    #[async_trait]
    impl HolidayTransport for SpyTransport {
        async fn fetch(&self, _date: NaiveDate) -> FlowResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.body
                .clone()
                .ok_or_else(|| FlowError::Transport("connection refused".to_string()))
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_fallback_spring_festival_on_network_failure() {
        let (spy, calls) = SpyTransport::new(None);
        let resolver = HolidayResolver::new(spy);

        let info = resolver.resolve(date(2025, 2, 1)).await;
        assert_eq!(info, HolidayInfo::holiday("春节"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_call_hits_cache() {
        let (spy, calls) = SpyTransport::new(Some(r#"{"code": 0, "holiday": null}"#));
        let resolver = HolidayResolver::new(spy);

        let first = resolver.resolve(date(2025, 3, 12)).await;
        let second = resolver.resolve(date(2025, 3, 12)).await;

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.cached_dates().await, 1);
    }

    #[tokio::test]
    async fn test_fallback_result_is_cached() {
        let (spy, calls) = SpyTransport::new(None);
        let resolver = HolidayResolver::new(spy);

        resolver.resolve(date(2025, 3, 12)).await;
        resolver.resolve(date(2025, 3, 12)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolver.cached(date(2025, 3, 12)).await, Some(HolidayInfo::work_day()));
    }

    #[tokio::test]
    async fn test_remote_answer_is_used() {
        let body = r#"{"code": 0, "holiday": {"holiday": true, "name": "国庆节", "wage": 3}}"#;
        let (spy, _) = SpyTransport::new(Some(body));
        let resolver = HolidayResolver::new(spy);

        let info = resolver.resolve(date(2025, 10, 2)).await;
        assert_eq!(info, HolidayInfo::holiday("国庆节"));
        assert_eq!(
            resolver.calendar_mode(date(2025, 10, 2)).await,
            CalendarMode::Holiday
        );
    }

    #[tokio::test]
    async fn test_make_up_work_day_is_not_a_holiday() {
        let body = r#"{"code": 0, "holiday": {"holiday": false, "name": "国庆节后补班"}}"#;
        let (spy, _) = SpyTransport::new(Some(body));
        let resolver = HolidayResolver::new(spy);

        assert_eq!(resolver.resolve(date(2025, 10, 11)).await, HolidayInfo::work_day());
    }

    #[tokio::test]
    async fn test_bad_status_and_malformed_body_fall_back() {
        let (spy, _) = SpyTransport::new(Some(r#"{"code": -1, "holiday": null}"#));
        let resolver = HolidayResolver::new(spy);
        assert_eq!(resolver.resolve(date(2025, 5, 2)).await, HolidayInfo::holiday("劳动节"));

        let (spy, _) = SpyTransport::new(Some("<html>502</html>"));
        let resolver = HolidayResolver::new(spy);
        assert_eq!(resolver.resolve(date(2025, 5, 2)).await, HolidayInfo::holiday("劳动节"));
    }

    #[tokio::test]
    async fn test_concurrent_lookups_are_coalesced() {
        let (mut spy, calls) = SpyTransport::new(Some(r#"{"code": 0, "holiday": null}"#));
        spy.delay = Duration::from_millis(20);
        let resolver = HolidayResolver::new(spy);

        let d = date(2025, 3, 12);
        let (a, b, c) = tokio::join!(resolver.resolve(d), resolver.resolve(d), resolver.resolve(d));

        assert_eq!(a, b);
        assert_eq!(b, c);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_one_lookup_per_distinct_date() {
        let (mut spy, calls) = SpyTransport::new(Some(r#"{"code": 0, "holiday": null}"#));
        spy.delay = Duration::from_millis(5);
        let resolver = HolidayResolver::new(spy);

        let dates = [date(2025, 3, 12), date(2025, 3, 13), date(2025, 3, 12), date(2025, 3, 13)];
        let results = futures::future::join_all(dates.iter().map(|d| resolver.resolve(*d))).await;

        assert_eq!(results.len(), 4);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(resolver.cached_dates().await, 2);
    }

    #[tokio::test]
    async fn test_offline_transport_uses_table() {
        let resolver = HolidayResolver::new(OfflineTransport);
        assert_eq!(resolver.resolve(date(2025, 1, 1)).await, HolidayInfo::holiday("元旦"));
        assert_eq!(resolver.resolve(date(2025, 2, 5)).await, HolidayInfo::work_day());
    }

    #[test]
    fn test_fallback_range_edges() {
        assert_eq!(HolidayInfo::fallback(date(2025, 1, 27)), HolidayInfo::work_day());
        assert_eq!(HolidayInfo::fallback(date(2025, 1, 28)), HolidayInfo::holiday("春节"));
        assert_eq!(HolidayInfo::fallback(date(2025, 2, 4)), HolidayInfo::holiday("春节"));
        assert_eq!(HolidayInfo::fallback(date(2025, 10, 8)), HolidayInfo::holiday("国庆节"));
        assert_eq!(HolidayInfo::fallback(date(2025, 10, 9)), HolidayInfo::work_day());
    }
}
