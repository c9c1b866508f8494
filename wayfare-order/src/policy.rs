use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Tz;
use wayfare_core::{CoreError, CoreResult};

/// Refunds are in full within this many hours of booking
const FULL_REFUND_HOURS: i64 = 24;

const EVENT_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundTier {
    Full,
    Half,
    /// Cancelled on the day of travel or check-in
    Nothing,
}

impl RefundTier {
    pub fn percent(self) -> i64 {
        match self {
            RefundTier::Full => 100,
            RefundTier::Half => 50,
            RefundTier::Nothing => 0,
        }
    }

    fn apply(self, total_cents: i64) -> i64 {
        match self {
            RefundTier::Full => total_cents,
            // half a cent rounds up
            RefundTier::Half => (total_cents + 1) / 2,
            RefundTier::Nothing => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefundQuote {
    pub tier: RefundTier,
    pub amount_cents: i64,
}

/// Time-windowed refund rules, evaluated in one configured zone
#[derive(Debug, Clone, Copy)]
pub struct RefundPolicy {
    timezone: Tz,
}

impl RefundPolicy {
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    /// Refund owed when cancelling at `now`.
    ///
    /// Without an event time only the 24-hour window applies: full refund
    /// inside it, half after.
    pub fn quote(
        &self,
        total_cents: i64,
        booked_at: DateTime<Utc>,
        event_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> CoreResult<RefundQuote> {
        let elapsed_hours = (now - booked_at).num_hours();

        let tier = match event_at {
            Some(event_at) => {
                if now > event_at {
                    return Err(CoreError::InvalidState(
                        "cannot cancel after travel/check-in".to_string(),
                    ));
                }
                if elapsed_hours <= FULL_REFUND_HOURS {
                    RefundTier::Full
                } else if self.local_date(now) == self.local_date(event_at) {
                    RefundTier::Nothing
                } else {
                    RefundTier::Half
                }
            }
            None if elapsed_hours <= FULL_REFUND_HOURS => RefundTier::Full,
            None => RefundTier::Half,
        };

        Ok(RefundQuote {
            tier,
            amount_cents: tier.apply(total_cents),
        })
    }

    fn local_date(&self, at: DateTime<Utc>) -> chrono::NaiveDate {
        at.with_timezone(&self.timezone).date_naive()
    }
}

/// Read a stored departure or check-in time; stored values are naive UTC
pub fn parse_event_time(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    EVENT_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}
