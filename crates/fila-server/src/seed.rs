use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use fila_db::Database;
use fila_db::models::{MedicationRow, PharmacyRow};

#[derive(Debug, Deserialize)]
pub struct SeedFile {
    pub pharmacies: Vec<SeedPharmacy>,
}

#[derive(Debug, Deserialize)]
pub struct SeedPharmacy {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub estimated_wait_minutes: Option<i64>,
    #[serde(default)]
    pub medications: Vec<SeedMedication>,
}

#[derive(Debug, Deserialize)]
pub struct SeedMedication {
    pub id: Uuid,
    pub name: String,
    pub dosage: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub pharmacies: usize,
    pub medications: usize,
}

pub fn load(path: &Path) -> Result<SeedFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read seed file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("malformed seed file {}", path.display()))
}

/// Upserts the catalog. Running it twice leaves the same rows, and queue
/// counters are never reset.
pub fn apply(db: &Database, seed: &SeedFile) -> Result<SeedSummary> {
    let mut summary = SeedSummary::default();

    for pharmacy in &seed.pharmacies {
        if let Some(lat) = pharmacy.latitude.filter(|lat| !(-90.0..=90.0).contains(lat)) {
            bail!("pharmacy {} has latitude {} out of range", pharmacy.id, lat);
        }
        if let Some(lng) = pharmacy.longitude.filter(|lng| !(-180.0..=180.0).contains(lng)) {
            bail!("pharmacy {} has longitude {} out of range", pharmacy.id, lng);
        }

        let pharmacy_id = pharmacy.id.to_string();
        db.upsert_pharmacy(&PharmacyRow {
            id: pharmacy_id.clone(),
            name: pharmacy.name.clone(),
            address: pharmacy.address.clone(),
            latitude: pharmacy.latitude,
            longitude: pharmacy.longitude,
        })?;
        summary.pharmacies += 1;

        if let Some(minutes) = pharmacy.estimated_wait_minutes {
            if minutes < 0 {
                bail!("pharmacy {} has a negative wait estimate", pharmacy.id);
            }
            db.configure_queue(&Uuid::new_v4().to_string(), &pharmacy_id, minutes)?;
        }

        for medication in &pharmacy.medications {
            db.upsert_medication(&MedicationRow {
                id: medication.id.to_string(),
                pharmacy_id: pharmacy_id.clone(),
                name: medication.name.clone(),
                dosage: medication.dosage.clone(),
                description: medication.description.clone(),
            })?;
            summary.medications += 1;
        }
    }

    info!(
        "Seeded {} pharmacies and {} medications",
        summary.pharmacies, summary.medications
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SEED: &str = r#"{
        "pharmacies": [
            {
                "id": "11111111-1111-1111-1111-111111111111",
                "name": "Farmácia Popular Sé",
                "address": "Praça da Sé, 100",
                "latitude": -23.5503,
                "longitude": -46.6339,
                "estimated_wait_minutes": 12,
                "medications": [
                    {"id": "aaaaaaaa-0000-0000-0000-000000000001", "name": "Dipirona", "dosage": "500mg", "description": null},
                    {"id": "aaaaaaaa-0000-0000-0000-000000000002", "name": "Losartana", "dosage": "50mg", "description": "Anti-hipertensivo"}
                ]
            },
            {
                "id": "22222222-2222-2222-2222-222222222222",
                "name": "UBS Bela Vista",
                "address": null,
                "latitude": null,
                "longitude": null
            }
        ]
    }"#;

    fn seed_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SEED.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_and_applies_catalog() {
        let file = seed_file();
        let db = Database::open_in_memory().unwrap();

        let seed = load(file.path()).unwrap();
        let summary = apply(&db, &seed).unwrap();
        assert_eq!(summary, SeedSummary { pharmacies: 2, medications: 2 });

        let pharmacies = db.list_pharmacies().unwrap();
        assert_eq!(pharmacies.len(), 2);

        let centro = "11111111-1111-1111-1111-111111111111";
        assert_eq!(db.list_medications(centro, None).unwrap().len(), 2);
        let queue = db.get_queue(centro).unwrap().unwrap();
        assert_eq!(queue.current_number, 0);
        assert_eq!(queue.estimated_wait_minutes, 12);

        assert!(db.get_queue("22222222-2222-2222-2222-222222222222").unwrap().is_none());
    }

    #[test]
    fn reapplying_is_idempotent() {
        let file = seed_file();
        let db = Database::open_in_memory().unwrap();
        let seed = load(file.path()).unwrap();

        apply(&db, &seed).unwrap();
        apply(&db, &seed).unwrap();

        assert_eq!(db.list_pharmacies().unwrap().len(), 2);
        assert_eq!(
            db.list_medications("11111111-1111-1111-1111-111111111111", None).unwrap().len(),
            2
        );
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        let seed: SeedFile = serde_json::from_str(
            r#"{"pharmacies":[{"id":"33333333-3333-3333-3333-333333333333","name":"X","address":null,"latitude":123.0,"longitude":0.0}]}"#,
        )
        .unwrap();
        let db = Database::open_in_memory().unwrap();
        assert!(apply(&db, &seed).is_err());
    }

    #[test]
    fn bundled_catalog_applies() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../seed/pharmacies.json");
        let db = Database::open_in_memory().unwrap();
        let summary = apply(&db, &load(&path).unwrap()).unwrap();
        assert_eq!(summary, SeedSummary { pharmacies: 3, medications: 6 });
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load(Path::new("/nonexistent/fila-seed.json")).is_err());
    }
}
