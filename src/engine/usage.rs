//! Community tier usage tracking.
//!
//! The counter file is read fresh on every community call so day and month
//! rollover is always evaluated against the current clock. Concurrent
//! processes are not synchronized; simultaneous runs can under- or
//! over-count.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::engine::error::{EngineError, QuotaPeriod};

/// Requests per calendar day allowed on the community tier.
pub const DEFAULT_DAILY_LIMIT: u32 = 50;
/// Requests per calendar month allowed on the community tier.
pub const DEFAULT_MONTHLY_LIMIT: u32 = 1000;

/// Persisted request counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageCounter {
    /// Requests made on `last_day_key`.
    pub day_count: u32,
    /// Requests made in `last_month_key`.
    pub month_count: u32,
    /// Day label (`%Y-%m-%d`) the day count belongs to.
    pub last_day_key: String,
    /// Month label (`%Y-%m`) the month count belongs to.
    pub last_month_key: String,
}

/// Quota limits for the community tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageLimits {
    /// Requests per day.
    pub daily: u32,
    /// Requests per month.
    pub monthly: u32,
}

impl Default for UsageLimits {
    fn default() -> Self {
        Self {
            daily: DEFAULT_DAILY_LIMIT,
            monthly: DEFAULT_MONTHLY_LIMIT,
        }
    }
}

/// Persistence for [`UsageCounter`].
pub trait UsageStore: Send + Sync {
    /// Reads the stored counter. `Ok(None)` when nothing is stored yet.
    fn load(&self) -> Result<Option<UsageCounter>>;

    /// Replaces the stored counter.
    fn save(&self, counter: &UsageCounter) -> Result<()>;
}

/// JSON file store, rewritten whole on every save.
pub struct FileUsageStore {
    path: PathBuf,
}

impl FileUsageStore {
    /// Store at an explicit path.
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at `~/.diffscribe/usage.json`.
    pub fn new() -> Result<Self> {
        Ok(Self::with_path(Self::default_path()?))
    }

    /// Default counter location.
    pub fn default_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir().context("Failed to determine home directory")?;
        Ok(home_dir.join(".diffscribe").join("usage.json"))
    }

    /// Location of the counter file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl UsageStore for FileUsageStore {
    fn load(&self) -> Result<Option<UsageCounter>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read usage file: {}", self.path.display()))?;
        let counter = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse usage file: {}", self.path.display()))?;
        Ok(Some(counter))
    }

    fn save(&self, counter: &UsageCounter) -> Result<()> {
        let parent = self
            .path
            .parent()
            .context("Usage file path has no parent directory")?;
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;

        let content =
            serde_json::to_string_pretty(counter).context("Failed to serialize usage counter")?;

        let mut file = tempfile::NamedTempFile::new_in(parent)
            .context("Failed to create temporary usage file")?;
        file.write_all(content.as_bytes())
            .context("Failed to write temporary usage file")?;
        file.persist(&self.path)
            .with_context(|| format!("Failed to replace usage file: {}", self.path.display()))?;
        Ok(())
    }
}

/// In-memory store for tests and dry runs.
#[derive(Default)]
pub struct MemoryUsageStore {
    counter: Mutex<Option<UsageCounter>>,
}

impl MemoryUsageStore {
    /// Store pre-seeded with `counter`.
    pub fn with_counter(counter: UsageCounter) -> Self {
        Self {
            counter: Mutex::new(Some(counter)),
        }
    }

    /// Current stored value.
    pub fn snapshot(&self) -> Option<UsageCounter> {
        self.counter
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl UsageStore for MemoryUsageStore {
    fn load(&self) -> Result<Option<UsageCounter>> {
        Ok(self.snapshot())
    }

    fn save(&self, counter: &UsageCounter) -> Result<()> {
        *self
            .counter
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(counter.clone());
        Ok(())
    }
}

/// Source of wall-clock time.
pub trait Clock: Send + Sync {
    /// Current local time.
    fn now(&self) -> DateTime<Local>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Reads, checks and records community tier usage.
pub struct UsageTracker {
    store: Box<dyn UsageStore>,
    clock: Box<dyn Clock>,
    limits: UsageLimits,
}

impl UsageTracker {
    /// Tracker with default limits and the system clock.
    pub fn new(store: Box<dyn UsageStore>) -> Self {
        Self::with_clock(store, Box::new(SystemClock), UsageLimits::default())
    }

    /// Fully configured tracker.
    pub fn with_clock(store: Box<dyn UsageStore>, clock: Box<dyn Clock>, limits: UsageLimits) -> Self {
        Self {
            store,
            clock,
            limits,
        }
    }

    /// Configured limits.
    pub const fn limits(&self) -> UsageLimits {
        self.limits
    }

    /// Loads the counter and applies day/month rollover.
    ///
    /// A missing or unreadable counter is treated as zero usage.
    pub fn read_counters(&self) -> UsageCounter {
        let stored = match self.store.load() {
            Ok(stored) => stored.unwrap_or_default(),
            Err(e) => {
                warn!("Ignoring unreadable usage counter: {e:#}");
                UsageCounter::default()
            }
        };

        let now = self.clock.now();
        let day_key = now.format("%Y-%m-%d").to_string();
        let month_key = now.format("%Y-%m").to_string();

        let mut counter = stored;
        if counter.last_month_key != month_key {
            counter.month_count = 0;
            counter.last_month_key = month_key;
        }
        if counter.last_day_key != day_key {
            counter.day_count = 0;
            counter.last_day_key = day_key;
        }
        counter
    }

    /// Fails with [`EngineError::QuotaExceeded`] when either window is used up.
    pub fn check_quota(&self, counter: &UsageCounter) -> Result<(), EngineError> {
        if counter.day_count >= self.limits.daily {
            return Err(EngineError::QuotaExceeded {
                period: QuotaPeriod::Daily,
                limit: self.limits.daily,
                used: counter.day_count,
            });
        }
        if counter.month_count >= self.limits.monthly {
            return Err(EngineError::QuotaExceeded {
                period: QuotaPeriod::Monthly,
                limit: self.limits.monthly,
                used: counter.month_count,
            });
        }
        Ok(())
    }

    /// Counts one successful call and persists immediately.
    ///
    /// A persistence failure is logged; it never fails the caller's request.
    pub fn record_use(&self, mut counter: UsageCounter) -> UsageCounter {
        counter.day_count = counter.day_count.saturating_add(1);
        counter.month_count = counter.month_count.saturating_add(1);
        debug!(
            day_count = counter.day_count,
            month_count = counter.month_count,
            "Recording community usage"
        );
        if let Err(e) = self.store.save(&counter) {
            warn!("Failed to persist usage counter: {e:#}");
        }
        counter
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    /// Clock frozen at a fixed local time.
    pub(crate) struct FixedClock(pub DateTime<Local>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Local> {
            self.0
        }
    }

    pub(crate) fn at(year: i32, month: u32, day: u32) -> FixedClock {
        FixedClock(Local.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap())
    }

    fn tracker_with(counter: Option<UsageCounter>, clock: FixedClock) -> UsageTracker {
        let store = counter.map_or_else(MemoryUsageStore::default, MemoryUsageStore::with_counter);
        UsageTracker::with_clock(Box::new(store), Box::new(clock), UsageLimits::default())
    }

    #[test]
    fn missing_counter_starts_at_zero() {
        let tracker = tracker_with(None, at(2026, 3, 14));
        let counter = tracker.read_counters();
        assert_eq!(counter.day_count, 0);
        assert_eq!(counter.month_count, 0);
        assert_eq!(counter.last_day_key, "2026-03-14");
        assert_eq!(counter.last_month_key, "2026-03");
    }

    #[test]
    fn day_rollover_keeps_month_count() {
        let stored = UsageCounter {
            day_count: 12,
            month_count: 40,
            last_day_key: "2026-03-13".to_string(),
            last_month_key: "2026-03".to_string(),
        };
        let tracker = tracker_with(Some(stored), at(2026, 3, 14));
        let counter = tracker.read_counters();
        assert_eq!(counter.day_count, 0);
        assert_eq!(counter.month_count, 40);
        assert_eq!(counter.last_day_key, "2026-03-14");
    }

    #[test]
    fn month_rollover_resets_both() {
        let stored = UsageCounter {
            day_count: 12,
            month_count: 400,
            last_day_key: "2026-02-28".to_string(),
            last_month_key: "2026-02".to_string(),
        };
        let tracker = tracker_with(Some(stored), at(2026, 3, 1));
        let counter = tracker.read_counters();
        assert_eq!(counter.day_count, 0);
        assert_eq!(counter.month_count, 0);
    }

    #[test]
    fn same_day_counts_are_kept() {
        let stored = UsageCounter {
            day_count: 7,
            month_count: 9,
            last_day_key: "2026-03-14".to_string(),
            last_month_key: "2026-03".to_string(),
        };
        let tracker = tracker_with(Some(stored.clone()), at(2026, 3, 14));
        assert_eq!(tracker.read_counters(), stored);
    }

    #[test]
    fn quota_checks_daily_then_monthly() {
        let tracker = tracker_with(None, at(2026, 3, 14));
        let mut counter = tracker.read_counters();
        counter.day_count = 49;
        assert!(tracker.check_quota(&counter).is_ok());

        counter.day_count = 50;
        let err = tracker.check_quota(&counter).unwrap_err();
        assert!(matches!(
            err,
            EngineError::QuotaExceeded {
                period: QuotaPeriod::Daily,
                limit: 50,
                used: 50
            }
        ));

        counter.day_count = 0;
        counter.month_count = 1000;
        let err = tracker.check_quota(&counter).unwrap_err();
        assert!(matches!(
            err,
            EngineError::QuotaExceeded {
                period: QuotaPeriod::Monthly,
                ..
            }
        ));
    }

    #[test]
    fn record_use_increments_once_and_persists() {
        let store = std::sync::Arc::new(MemoryUsageStore::default());
        struct Shared(std::sync::Arc<MemoryUsageStore>);
        impl UsageStore for Shared {
            fn load(&self) -> Result<Option<UsageCounter>> {
                self.0.load()
            }
            fn save(&self, counter: &UsageCounter) -> Result<()> {
                self.0.save(counter)
            }
        }

        let tracker = UsageTracker::with_clock(
            Box::new(Shared(store.clone())),
            Box::new(at(2026, 3, 14)),
            UsageLimits::default(),
        );
        let counter = tracker.read_counters();
        let recorded = tracker.record_use(counter);
        assert_eq!(recorded.day_count, 1);
        assert_eq!(recorded.month_count, 1);
        assert_eq!(store.snapshot(), Some(recorded));
    }

    #[test]
    fn file_store_round_trips_and_tolerates_corruption() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("usage.json");
        let store = FileUsageStore::with_path(path.clone());
        assert!(store.load().unwrap().is_none());

        let counter = UsageCounter {
            day_count: 3,
            month_count: 5,
            last_day_key: "2026-03-14".to_string(),
            last_month_key: "2026-03".to_string(),
        };
        store.save(&counter).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"dayCount\": 3"));
        assert_eq!(store.load().unwrap(), Some(counter));

        fs::write(&path, "{ not json").unwrap();
        assert!(store.load().is_err());

        let tracker = UsageTracker::with_clock(
            Box::new(FileUsageStore::with_path(path)),
            Box::new(at(2026, 3, 14)),
            UsageLimits::default(),
        );
        let counter = tracker.read_counters();
        assert_eq!(counter.day_count, 0);
        assert_eq!(counter.month_count, 0);
    }
}
