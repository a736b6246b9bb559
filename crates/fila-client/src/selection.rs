use uuid::Uuid;

use fila_types::api::{JoinQueueRequest, MedicationItem};
use fila_types::models::Medication;

#[derive(Debug, Clone, PartialEq)]
pub struct SelectedMedication {
    pub medication: Medication,
    pub quantity: u32,
}

/// Medications picked for a check-in, in the order they were first chosen.
///
/// Holds at most one entry per medication and never a zero quantity.
#[derive(Debug, Clone, Default)]
pub struct MedicationSelection {
    items: Vec<SelectedMedication>,
}

impl MedicationSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the quantity for `medication`. Zero removes it.
    pub fn set_quantity(&mut self, medication: &Medication, quantity: u32) {
        let existing = self.items.iter().position(|s| s.medication.id == medication.id);
        match (existing, quantity) {
            (Some(idx), 0) => {
                self.items.remove(idx);
            }
            (Some(idx), q) => self.items[idx].quantity = q,
            (None, 0) => {}
            (None, q) => self.items.push(SelectedMedication { medication: medication.clone(), quantity: q }),
        }
    }

    pub fn increment(&mut self, medication: &Medication) {
        let next = self.quantity_of(medication.id).saturating_add(1);
        self.set_quantity(medication, next);
    }

    pub fn decrement(&mut self, medication: &Medication) {
        let next = self.quantity_of(medication.id).saturating_sub(1);
        self.set_quantity(medication, next);
    }

    pub fn quantity_of(&self, medication_id: Uuid) -> u32 {
        self.items
            .iter()
            .find(|s| s.medication.id == medication_id)
            .map_or(0, |s| s.quantity)
    }

    pub fn items(&self) -> &[SelectedMedication] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn to_request(&self) -> JoinQueueRequest {
        JoinQueueRequest {
            medications: self
                .items
                .iter()
                .map(|s| MedicationItem { medication_id: s.medication.id, quantity: s.quantity })
                .collect(),
        }
    }
}
