//! Row to API model conversion. Corrupt stored values are logged and replaced
//! with defaults instead of failing the whole response.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use fila_db::models::{CheckInRow, MedicationRow, PharmacyRow, PickupRow, ProfileRow};
use fila_types::api::MedicationItem;
use fila_types::models::{CheckIn, CheckInStatus, Medication, Pharmacy, Pickup, Profile};

fn parse_uuid(value: &str, what: &str) -> Uuid {
    value.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, value, e);
        Uuid::default()
    })
}

fn parse_timestamp(value: &str, what: &str) -> DateTime<Utc> {
    value
        .parse::<DateTime<Utc>>()
        .or_else(|_| {
            // SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
            chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt {} '{}': {}", what, value, e);
            DateTime::default()
        })
}

pub fn status(value: &str) -> CheckInStatus {
    value.parse().unwrap_or_else(|e| {
        warn!("{}", e);
        CheckInStatus::Cancelled
    })
}

pub fn profile(row: &ProfileRow) -> Profile {
    Profile {
        id: parse_uuid(&row.id, "profile id"),
        full_name: row.full_name.clone(),
        created_at: parse_timestamp(&row.created_at, "profile created_at"),
    }
}

pub fn pharmacy(row: PharmacyRow) -> Pharmacy {
    Pharmacy {
        id: parse_uuid(&row.id, "pharmacy id"),
        name: row.name,
        address: row.address,
        latitude: row.latitude,
        longitude: row.longitude,
    }
}

pub fn medication(row: MedicationRow) -> Medication {
    Medication {
        id: parse_uuid(&row.id, "medication id"),
        pharmacy_id: parse_uuid(&row.pharmacy_id, "medication pharmacy_id"),
        name: row.name,
        dosage: row.dosage,
        description: row.description,
    }
}

pub fn check_in(row: CheckInRow) -> CheckIn {
    CheckIn {
        id: parse_uuid(&row.id, "check-in id"),
        user_id: parse_uuid(&row.user_id, "check-in user_id"),
        pharmacy_id: parse_uuid(&row.pharmacy_id, "check-in pharmacy_id"),
        queue_number: row.queue_number,
        medications: row
            .items
            .iter()
            .map(|item| MedicationItem {
                medication_id: parse_uuid(&item.medication_id, "check-in medication_id"),
                quantity: item.quantity,
            })
            .collect(),
        status: status(&row.status),
        created_at: parse_timestamp(&row.created_at, "check-in created_at"),
    }
}

pub fn pickup(row: PickupRow) -> Pickup {
    Pickup {
        id: parse_uuid(&row.id, "pickup id"),
        user_id: parse_uuid(&row.user_id, "pickup user_id"),
        medication: row.medication,
        quantity: row.quantity,
        pickup_date: parse_timestamp(&row.pickup_date, "pickup_date"),
    }
}
