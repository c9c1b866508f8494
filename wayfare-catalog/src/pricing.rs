use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use tracing::{debug, error, info};
use wayfare_core::{Clock, CoreError, CoreResult, DocumentStore, Filter, StoreError};
use wayfare_shared::{format_cents, Booking, BookingType, Flight, PriceHistory};

/// Basis points in a factor of 1.0
const UNIT_BP: i64 = 10_000;
const HOLIDAY_BP: i64 = 2_000;
/// Prices never rise more than 50% over base
const MAX_FACTOR_BP: i64 = 15_000;
const DEMAND_WINDOW_DAYS: i64 = 7;

/// Calendar days, as `(month, day)`, that carry the holiday surcharge
#[derive(Debug, Clone, Default)]
pub struct HolidayCalendar {
    days: HashSet<(u32, u32)>,
}

impl HolidayCalendar {
    /// Parse `MM-DD` entries
    pub fn from_strings(entries: &[String]) -> CoreResult<Self> {
        let mut days = HashSet::new();
        for entry in entries {
            let parsed = entry
                .split_once('-')
                .and_then(|(m, d)| Some((m.trim().parse::<u32>().ok()?, d.trim().parse::<u32>().ok()?)))
                .filter(|(m, d)| NaiveDate::from_ymd_opt(2000, *m, *d).is_some());

            match parsed {
                Some(day) => {
                    days.insert(day);
                }
                None => {
                    return Err(CoreError::ValidationError(format!(
                        "holiday '{}' is not a MM-DD date",
                        entry
                    )))
                }
            }
        }
        Ok(Self { days })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.days.contains(&(date.month(), date.day()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemandTier {
    Low,
    Light,
    Medium,
    High,
}

impl DemandTier {
    /// Tier for the number of bookings in the trailing window
    pub fn from_count(bookings: usize) -> Self {
        match bookings {
            0..=4 => DemandTier::Low,
            5..=9 => DemandTier::Light,
            10..=19 => DemandTier::Medium,
            _ => DemandTier::High,
        }
    }

    pub fn surcharge_bp(self) -> i64 {
        match self {
            DemandTier::Low => 0,
            DemandTier::Light => 1_000,
            DemandTier::Medium => 2_000,
            DemandTier::High => 3_000,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            DemandTier::Low => "low demand",
            DemandTier::Light => "light demand (5–9 bookings in last 7 days)",
            DemandTier::Medium => "medium demand (10–19 bookings in last 7 days)",
            DemandTier::High => "high demand (20+ bookings in last 7 days)",
        }
    }
}

/// Signals that move a flight's price away from its base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceFactors {
    pub holiday: bool,
    pub demand: DemandTier,
}

impl PriceFactors {
    /// Combined multiplier in basis points, capped at 1.5x
    pub fn combined_bp(&self) -> i64 {
        let holiday = if self.holiday { HOLIDAY_BP } else { 0 };
        (UNIT_BP + holiday + self.demand.surcharge_bp()).min(MAX_FACTOR_BP)
    }

    /// Price in cents, half a cent rounding up
    pub fn apply(&self, base_cents: i64) -> i64 {
        (base_cents * self.combined_bp() + UNIT_BP / 2) / UNIT_BP
    }

    pub fn reason(&self, base_cents: i64, new_cents: i64) -> String {
        let mut reason = String::from("dynamic pricing: ");
        if self.holiday {
            reason.push_str("holiday +20%; ");
        }
        reason.push_str(self.demand.describe());
        reason.push_str("; ");
        reason.push_str(&format!(
            "base={}, new={}",
            format_cents(base_cents),
            format_cents(new_cents)
        ));
        reason
    }
}

#[derive(Debug, Clone)]
pub struct PricingConfig {
    pub holidays: HolidayCalendar,
    /// Zone whose calendar date decides the holiday surcharge
    pub timezone: Tz,
    pub max_conflict_retries: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            holidays: HolidayCalendar::default(),
            timezone: Tz::UTC,
            max_conflict_retries: 5,
        }
    }
}

/// Outcome counts for one pricing pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub evaluated: usize,
    pub updated: usize,
    pub skipped_frozen: usize,
    pub skipped_unpriced: usize,
    pub unchanged: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reprice {
    Updated { from: i64, to: i64 },
    Frozen,
    Unpriced,
    Unchanged,
}

/// Periodic repricing of flights from holiday and demand signals
pub struct DynamicPricingEngine {
    flights: Arc<dyn DocumentStore<Flight>>,
    bookings: Arc<dyn DocumentStore<Booking>>,
    price_history: Arc<dyn DocumentStore<PriceHistory>>,
    clock: Arc<dyn Clock>,
    config: PricingConfig,
}

impl DynamicPricingEngine {
    pub fn new(
        flights: Arc<dyn DocumentStore<Flight>>,
        bookings: Arc<dyn DocumentStore<Booking>>,
        price_history: Arc<dyn DocumentStore<PriceHistory>>,
        clock: Arc<dyn Clock>,
        config: PricingConfig,
    ) -> Self {
        Self {
            flights,
            bookings,
            price_history,
            clock,
            config,
        }
    }

    /// Evaluate every flight once.
    ///
    /// A flight that fails is logged and counted; the rest of the batch still
    /// runs. Only failing to list the flights fails the cycle.
    pub async fn run_cycle(&self) -> CoreResult<CycleReport> {
        let now = self.clock.now();
        let local_date = now.with_timezone(&self.config.timezone).date_naive();
        let holiday = self.config.holidays.contains(local_date);

        let flights = self.flights.find_all().await?;
        let mut report = CycleReport::default();

        for flight in flights {
            report.evaluated += 1;
            match self.reprice(&flight.id, holiday, now).await {
                Ok(Reprice::Updated { from, to }) => {
                    info!(
                        "Repriced flight {}: {} -> {}",
                        flight.id,
                        format_cents(from),
                        format_cents(to)
                    );
                    report.updated += 1;
                }
                Ok(Reprice::Frozen) => {
                    debug!("Flight {} is price-frozen, skipping", flight.id);
                    report.skipped_frozen += 1;
                }
                Ok(Reprice::Unpriced) => report.skipped_unpriced += 1,
                Ok(Reprice::Unchanged) => report.unchanged += 1,
                Err(e) => {
                    error!("Pricing failed for flight {}: {}", flight.id, e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn reprice(&self, flight_id: &str, holiday: bool, now: DateTime<Utc>) -> CoreResult<Reprice> {
        let max_attempts = self.config.max_conflict_retries.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            // Re-read on every attempt so a freeze set meanwhile is honoured
            let mut flight = self
                .flights
                .find_by_id(flight_id)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("Flight {}", flight_id)))?;

            if flight.base_price_cents <= 0 {
                return Ok(Reprice::Unpriced);
            }
            if flight.is_frozen_at(now) {
                return Ok(Reprice::Frozen);
            }

            let demand = self.recent_demand(flight_id, now).await?;
            let factors = PriceFactors {
                holiday,
                demand: DemandTier::from_count(demand),
            };
            let base = flight.base_price_cents;
            let new_price = factors.apply(base);
            let old_price = flight.effective_price_cents();

            if new_price == old_price {
                return Ok(Reprice::Unchanged);
            }

            flight.current_price_cents = new_price;
            match self.flights.save(flight).await {
                Ok(_) => {
                    let reason = factors.reason(base, new_price);
                    let entry = PriceHistory::for_flight(flight_id, new_price, now, reason.clone());
                    // Later cycles see the price as unchanged, so this row is never retried
                    if let Err(e) = self.price_history.save(entry).await {
                        error!(
                            "Flight {} repriced {} -> {} at {} without a history entry ({}): {}",
                            flight_id,
                            format_cents(old_price),
                            format_cents(new_price),
                            now,
                            reason,
                            e
                        );
                        return Err(e.into());
                    }
                    return Ok(Reprice::Updated {
                        from: old_price,
                        to: new_price,
                    });
                }
                Err(StoreError::VersionConflict { .. }) if attempt < max_attempts => {
                    debug!("Flight {} changed during repricing, re-evaluating", flight_id);
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Flight bookings made within the trailing week
    async fn recent_demand(&self, flight_id: &str, now: DateTime<Utc>) -> CoreResult<usize> {
        let since = now - Duration::days(DEMAND_WINDOW_DAYS);
        let filter = Filter::new()
            .eq("booking_type", BookingType::Flight.as_str())
            .eq("resource_ref", flight_id);

        let bookings = self.bookings.find_by(&filter).await?;
        Ok(bookings.iter().filter(|b| b.booking_time > since).count())
    }
}
