use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CheckInStatus, Pharmacy, Profile};

// -- JWT Claims --

/// Session token claims. `sub` is the profile id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
}

// -- Errors --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

// -- Auth --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignInRequest {
    pub cpf: String,
    pub sus_card: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInResponse {
    pub profile: Profile,
    pub token: String,
}

// -- Catalog --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearbyPharmacy {
    #[serde(flatten)]
    pub pharmacy: Pharmacy,
    pub distance_km: f64,
}

/// A pharmacy's queue counters. `current_number` is the last ticket issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueInfo {
    pub pharmacy_id: Uuid,
    pub current_number: i64,
    pub estimated_wait_minutes: i64,
}

// -- Check-ins --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationItem {
    pub medication_id: Uuid,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SelectionError {
    #[error("select at least one medication")]
    Empty,
    #[error("quantity for medication {0} must be greater than zero")]
    ZeroQuantity(Uuid),
    #[error("medication {0} selected more than once")]
    Duplicate(Uuid),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JoinQueueRequest {
    pub medications: Vec<MedicationItem>,
}

impl JoinQueueRequest {
    /// Checked on both sides of the wire, before any store access.
    pub fn validate(&self) -> Result<(), SelectionError> {
        if self.medications.is_empty() {
            return Err(SelectionError::Empty);
        }
        let mut seen = HashSet::with_capacity(self.medications.len());
        for item in &self.medications {
            if item.quantity == 0 {
                return Err(SelectionError::ZeroQuantity(item.medication_id));
            }
            if !seen.insert(item.medication_id) {
                return Err(SelectionError::Duplicate(item.medication_id));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketResponse {
    pub check_in_id: Uuid,
    pub pharmacy_id: Uuid,
    pub queue_number: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QueueStatusQuery {
    pub queue_number: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStatusResponse {
    pub pharmacy_id: Uuid,
    pub queue_number: i64,
    pub current_number: i64,
    pub estimated_wait_minutes: i64,
    /// Waiting tickets numbered below `queue_number`. 0 means next.
    pub position: i64,
    /// `None` once the ticket no longer exists.
    pub ticket_status: Option<CheckInStatus>,
}
