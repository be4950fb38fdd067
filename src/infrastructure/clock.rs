use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use std::sync::Arc;

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Injected time source. Wall-clock reads go through the now-provider so
/// tests can pin the instant; local-day arithmetic goes through the
/// configured timezone so a timezone change only requires rebuilding the
/// clock and re-running a sync pass.
#[derive(Clone)]
pub struct Clock {
    now_provider: NowProvider,
    timezone: Tz,
}

impl Clock {
    pub fn system(timezone: Tz) -> Self {
        Self {
            now_provider: Arc::new(Utc::now),
            timezone,
        }
    }

    pub fn fixed(at: DateTime<Utc>, timezone: Tz) -> Self {
        Self {
            now_provider: Arc::new(move || at),
            timezone,
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.now_provider)()
    }

    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.timezone).date_naive()
    }

    /// Milliseconds since local midnight for the given instant.
    pub fn time_of_day_ms(&self, at: DateTime<Utc>) -> i64 {
        let local = at.with_timezone(&self.timezone).time();
        i64::from(local.num_seconds_from_midnight()) * 1000
            + i64::from(local.nanosecond() / 1_000_000)
    }

    /// Resolves "local midnight of `date` plus `offset_ms`" to an instant.
    /// Ambiguous local times resolve to the earlier instant; times falling
    /// into a DST gap are pushed forward by an hour.
    pub fn local_instant(&self, date: NaiveDate, offset_ms: i64) -> Option<DateTime<Utc>> {
        let naive = date
            .and_time(NaiveTime::MIN)
            .checked_add_signed(Duration::milliseconds(offset_ms))?;
        let resolved = self
            .timezone
            .from_local_datetime(&naive)
            .earliest()
            .or_else(|| {
                self.timezone
                    .from_local_datetime(&(naive + Duration::hours(1)))
                    .earliest()
            })?;
        Some(resolved.with_timezone(&Utc))
    }

    /// First local-midnight boundary strictly after `at`. Drives the daily
    /// rollover one-shot timer.
    pub fn local_midnight_after(&self, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let mut date = self.local_date(at);
        for _ in 0..3 {
            date = date.succ_opt()?;
            if let Some(instant) = self.local_instant(date, 0) {
                if instant > at {
                    return Some(instant);
                }
            }
        }
        None
    }
}

impl std::fmt::Debug for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clock")
            .field("timezone", &self.timezone)
            .finish_non_exhaustive()
    }
}
