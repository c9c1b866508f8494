use serde::{Deserialize, Serialize};

use super::{FlightStatus, Seat};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// First event a new subscriber receives
    Init,
    Update,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum EventPayload {
    Seats(Vec<Seat>),
    FlightStatus(FlightStatus),
}

/// Change event pushed to every subscriber of a resource group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroupEvent {
    pub group_id: String,
    pub event_type: EventType,
    pub payload: EventPayload,
}

impl GroupEvent {
    pub fn init(group_id: &str, payload: EventPayload) -> Self {
        Self {
            group_id: group_id.to_string(),
            event_type: EventType::Init,
            payload,
        }
    }

    pub fn update(group_id: &str, payload: EventPayload) -> Self {
        Self {
            group_id: group_id.to_string(),
            event_type: EventType::Update,
            payload,
        }
    }
}
