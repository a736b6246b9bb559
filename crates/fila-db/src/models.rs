/// Database row types. These map directly to SQLite rows and stay
/// independent of the fila-types API models.

pub struct ProfileRow {
    pub id: String,
    pub national_id_hash: String,
    pub sus_card_hash: String,
    pub full_name: String,
    pub push_token: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct PharmacyRow {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct MedicationRow {
    pub id: String,
    pub pharmacy_id: String,
    pub name: String,
    pub dosage: Option<String>,
    pub description: Option<String>,
}

pub struct QueueRow {
    pub id: String,
    pub pharmacy_id: String,
    pub current_number: i64,
    pub estimated_wait_minutes: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckInItemRow {
    pub medication_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone)]
pub struct CheckInRow {
    pub id: String,
    pub user_id: String,
    pub pharmacy_id: String,
    pub queue_number: i64,
    pub status: String,
    pub created_at: String,
    pub items: Vec<CheckInItemRow>,
}

/// Snapshot read by the status poller.
pub struct QueueStatusRow {
    pub current_number: i64,
    pub estimated_wait_minutes: i64,
    pub position: i64,
    pub ticket_status: Option<String>,
}

pub struct PickupRow {
    pub id: String,
    pub user_id: String,
    pub medication: String,
    pub quantity: u32,
    pub pickup_date: String,
}
