/// Report cache
///
/// Pipeline runs are cached by the caller, keyed by station, requested
/// window and a fingerprint of the pipeline configuration. Entries expire
/// after a fixed TTL and the oldest entry is evicted once the cache is full.
/// Time is passed in explicitly so expiry is testable without sleeping.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;

use crate::config::{CacheConfig, PipelineConfig};
use crate::ingest::frost::ObservationSource;
use crate::logging::{self, DataSource};
use crate::model::WeatherError;
use crate::pipeline::{HazardReport, fetch_and_process};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub station_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub config_fingerprint: u64,
}

impl CacheKey {
    pub fn new(
        station_id: &str,
        start: DateTime<Tz>,
        end: DateTime<Tz>,
        config: &PipelineConfig,
    ) -> Self {
        CacheKey {
            station_id: station_id.to_string(),
            start: start.with_timezone(&Utc),
            end: end.with_timezone(&Utc),
            config_fingerprint: config.fingerprint(),
        }
    }
}

pub trait ReportCache {
    fn get(&mut self, key: &CacheKey, now: DateTime<Utc>) -> Option<HazardReport>;
    fn insert(&mut self, key: CacheKey, report: HazardReport, now: DateTime<Utc>);
}

#[derive(Clone)]
struct CachedReport {
    report: HazardReport,
    created_at: DateTime<Utc>,
}

/// In-memory cache with expiry and a bounded entry count.
pub struct TtlCache {
    ttl: Duration,
    max_entries: usize,
    entries: HashMap<CacheKey, CachedReport>,
}

impl TtlCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            entries: HashMap::new(),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        TtlCache::new(config.ttl(), config.max_entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn purge_expired(&mut self, now: DateTime<Utc>) {
        let ttl = self.ttl;
        self.entries.retain(|_, v| now - v.created_at <= ttl);
    }
}

impl ReportCache for TtlCache {
    fn get(&mut self, key: &CacheKey, now: DateTime<Utc>) -> Option<HazardReport> {
        self.purge_expired(now);
        self.entries.get(key).map(|e| e.report.clone())
    }

    fn insert(&mut self, key: CacheKey, report: HazardReport, now: DateTime<Utc>) {
        if self.max_entries == 0 {
            return;
        }
        self.purge_expired(now);
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            if let Some(victim) = self
                .entries
                .iter()
                .min_by_key(|(_, v)| v.created_at)
                .map(|(k, _)| k.clone())
            {
                self.entries.remove(&victim);
            }
        }
        self.entries.insert(
            key,
            CachedReport {
                report,
                created_at: now,
            },
        );
    }
}

/// Serve a report from `cache`, running fetch and pipeline on a miss.
/// Failures are not cached.
pub fn fetch_report_cached(
    cache: &mut dyn ReportCache,
    source: &dyn ObservationSource,
    station_id: &str,
    start: DateTime<Tz>,
    end: DateTime<Tz>,
    now: DateTime<Utc>,
    config: &PipelineConfig,
) -> Result<HazardReport, WeatherError> {
    let key = CacheKey::new(station_id, start, end, config);
    if let Some(report) = cache.get(&key, now) {
        logging::debug(DataSource::Cache, Some(station_id), "hit");
        return Ok(report);
    }

    logging::debug(DataSource::Cache, Some(station_id), "miss");
    let report = fetch_and_process(source, station_id, start, end, now, config)?;
    cache.insert(key, report.clone(), now);
    Ok(report)
}
