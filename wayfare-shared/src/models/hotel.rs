use serde::{Deserialize, Serialize};

use super::impl_document;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hotel {
    pub id: String,
    pub name: String,
    pub available_rooms: i32,
    /// Naive ISO-8601 timestamp, stored as UTC
    pub check_in_time: Option<String>,
    #[serde(default)]
    pub version: u64,
}

impl_document!(Hotel, "hotels");

impl Hotel {
    pub fn new(id: &str, name: &str, available_rooms: i32, check_in_time: Option<String>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            available_rooms,
            check_in_time,
            version: 0,
        }
    }
}
