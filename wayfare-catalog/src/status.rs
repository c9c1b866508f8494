use std::sync::Arc;

use dashmap::DashMap;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info};
use wayfare_core::{require_non_blank, Clock, CoreResult, Notifier, Subscription};
use wayfare_shared::{EventPayload, FlightStatus, GroupEvent};

pub const DELAY_REASONS: [&str; 6] = [
    "Weather issues",
    "Technical inspection",
    "Air traffic congestion",
    "Crew rest requirements",
    "Runway maintenance",
    "Security checks",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delay {
    pub minutes: i64,
    pub reason: String,
}

/// Decides whether a tracked flight slips on a given tick
pub trait DelaySource: Send + Sync {
    fn next_delay(&self, flight_id: &str) -> Option<Delay>;
}

/// 30% chance per tick of a 10 to 50 minute delay
pub struct RandomDelaySource {
    probability: f64,
}

impl RandomDelaySource {
    pub fn new() -> Self {
        Self { probability: 0.3 }
    }
}

impl Default for RandomDelaySource {
    fn default() -> Self {
        Self::new()
    }
}

impl DelaySource for RandomDelaySource {
    fn next_delay(&self, _flight_id: &str) -> Option<Delay> {
        let mut rng = rand::thread_rng();
        if !rng.gen_bool(self.probability) {
            return None;
        }
        let reason = DELAY_REASONS.choose(&mut rng)?;
        Some(Delay {
            minutes: rng.gen_range(10..=50),
            reason: reason.to_string(),
        })
    }
}

pub struct NoDelays;

impl DelaySource for NoDelays {
    fn next_delay(&self, _flight_id: &str) -> Option<Delay> {
        None
    }
}

/// Live status of the flights someone has asked about
pub struct FlightStatusBoard {
    statuses: DashMap<String, FlightStatus>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    delays: Arc<dyn DelaySource>,
}

impl FlightStatusBoard {
    pub fn new(notifier: Arc<dyn Notifier>, clock: Arc<dyn Clock>, delays: Arc<dyn DelaySource>) -> Self {
        Self {
            statuses: DashMap::new(),
            notifier,
            clock,
            delays,
        }
    }

    /// Current status; a flight seen for the first time starts on time
    pub fn status(&self, flight_id: &str) -> CoreResult<FlightStatus> {
        require_non_blank("flight_id", flight_id)?;
        let status = self
            .statuses
            .entry(flight_id.to_string())
            .or_insert_with(|| FlightStatus::on_time(flight_id, self.clock.now()))
            .clone();
        Ok(status)
    }

    pub fn update_status(&self, flight_id: &str, mut status: FlightStatus) -> CoreResult<FlightStatus> {
        require_non_blank("flight_id", flight_id)?;
        status.flight_id = flight_id.to_string();
        status.last_updated = self.clock.now();

        self.statuses.insert(flight_id.to_string(), status.clone());
        info!("Flight {} status set to {:?}", flight_id, status.status);
        self.broadcast(&status);
        Ok(status)
    }

    pub fn subscribe(&self, flight_id: &str) -> CoreResult<Subscription> {
        let status = self.status(flight_id)?;
        let init = GroupEvent::init(flight_id, EventPayload::FlightStatus(status));
        Ok(self.notifier.subscribe(flight_id, Some(init)))
    }

    /// Roll for delays on every tracked flight; returns how many slipped
    pub fn tick(&self) -> usize {
        let now = self.clock.now();
        let flight_ids: Vec<String> = self.statuses.iter().map(|e| e.key().clone()).collect();

        let mut delayed = Vec::new();
        for flight_id in flight_ids {
            let Some(delay) = self.delays.next_delay(&flight_id) else {
                continue;
            };
            if let Some(mut status) = self.statuses.get_mut(&flight_id) {
                status.delay(delay.minutes, delay.reason, now);
                delayed.push(status.clone());
            }
        }

        for status in &delayed {
            debug!(
                "Flight {} delayed {} min: {}",
                status.flight_id,
                status.delay_minutes,
                status.delay_reason.as_deref().unwrap_or_default()
            );
            self.broadcast(status);
        }
        delayed.len()
    }

    fn broadcast(&self, status: &FlightStatus) {
        self.notifier.publish(GroupEvent::update(
            &status.flight_id,
            EventPayload::FlightStatus(status.clone()),
        ));
    }
}
