use crate::Database;
use crate::models::{
    CheckInItemRow, CheckInRow, MedicationRow, PharmacyRow, PickupRow, ProfileRow, QueueRow,
    QueueStatusRow,
};
use anyhow::Result;
use rusqlite::{Connection, Row};

impl Database {
    // -- Profiles --

    pub fn create_profile(
        &self,
        id: &str,
        national_id_hash: &str,
        sus_card_hash: &str,
        full_name: &str,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO profiles (id, national_id_hash, sus_card_hash, full_name)
                 VALUES (?1, ?2, ?3, ?4)",
                (id, national_id_hash, sus_card_hash, full_name),
            )?;
            Ok(())
        })
    }

    pub fn get_profile_by_national_id(&self, national_id_hash: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| {
            query_profile(conn, "WHERE national_id_hash = ?1", national_id_hash)
        })
    }

    pub fn get_profile_by_id(&self, id: &str) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| query_profile(conn, "WHERE id = ?1", id))
    }

    // -- Catalog --

    pub fn upsert_pharmacy(&self, row: &PharmacyRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO pharmacies (id, name, address, latitude, longitude)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    name = excluded.name,
                    address = excluded.address,
                    latitude = excluded.latitude,
                    longitude = excluded.longitude",
                rusqlite::params![row.id, row.name, row.address, row.latitude, row.longitude],
            )?;
            Ok(())
        })
    }

    pub fn upsert_medication(&self, row: &MedicationRow) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO medications (id, pharmacy_id, name, dosage, description)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    pharmacy_id = excluded.pharmacy_id,
                    name = excluded.name,
                    dosage = excluded.dosage,
                    description = excluded.description",
                rusqlite::params![row.id, row.pharmacy_id, row.name, row.dosage, row.description],
            )?;
            Ok(())
        })
    }

    /// Sets a pharmacy's per-ticket wait estimate, creating its queue if needed.
    /// Never touches `current_number`.
    pub fn configure_queue(
        &self,
        queue_id: &str,
        pharmacy_id: &str,
        estimated_wait_minutes: i64,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO queues (id, pharmacy_id, current_number, estimated_wait_minutes)
                 VALUES (?1, ?2, 0, ?3)
                 ON CONFLICT(pharmacy_id) DO UPDATE SET
                    estimated_wait_minutes = excluded.estimated_wait_minutes",
                rusqlite::params![queue_id, pharmacy_id, estimated_wait_minutes],
            )?;
            Ok(())
        })
    }

    pub fn list_pharmacies(&self) -> Result<Vec<PharmacyRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, address, latitude, longitude FROM pharmacies ORDER BY name",
            )?;
            let rows = stmt
                .query_map([], pharmacy_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Pharmacies whose coordinates fall inside the given box.
    pub fn pharmacies_in_box(
        &self,
        min_lat: f64,
        max_lat: f64,
        min_lng: f64,
        max_lng: f64,
        limit: u32,
    ) -> Result<Vec<PharmacyRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, address, latitude, longitude FROM pharmacies
                 WHERE latitude BETWEEN ?1 AND ?2
                   AND longitude BETWEEN ?3 AND ?4
                 LIMIT ?5",
            )?;
            let rows = stmt
                .query_map(
                    rusqlite::params![min_lat, max_lat, min_lng, max_lng, limit],
                    pharmacy_from_row,
                )?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_pharmacy(&self, id: &str) -> Result<Option<PharmacyRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, address, latitude, longitude FROM pharmacies WHERE id = ?1",
                [id],
                pharmacy_from_row,
            )
            .optional()
        })
    }

    /// Medications stocked by a pharmacy, optionally filtered by a
    /// case-insensitive name fragment.
    pub fn list_medications(&self, pharmacy_id: &str, search: Option<&str>) -> Result<Vec<MedicationRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, pharmacy_id, name, dosage, description FROM medications
                 WHERE pharmacy_id = ?1
                   AND (?2 IS NULL OR instr(lower(name), lower(?2)) > 0)
                 ORDER BY name",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![pharmacy_id, search], |row| {
                    Ok(MedicationRow {
                        id: row.get(0)?,
                        pharmacy_id: row.get(1)?,
                        name: row.get(2)?,
                        dosage: row.get(3)?,
                        description: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Queues --

    pub fn get_queue(&self, pharmacy_id: &str) -> Result<Option<QueueRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, pharmacy_id, current_number, estimated_wait_minutes
                 FROM queues WHERE pharmacy_id = ?1",
                [pharmacy_id],
                |row| {
                    Ok(QueueRow {
                        id: row.get(0)?,
                        pharmacy_id: row.get(1)?,
                        current_number: row.get(2)?,
                        estimated_wait_minutes: row.get(3)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Count of waiting tickets numbered strictly below `queue_number`.
    pub fn queue_position(&self, pharmacy_id: &str, queue_number: i64) -> Result<i64> {
        self.with_conn(|conn| count_ahead(conn, pharmacy_id, queue_number))
    }

    /// Queue counters, position and the ticket's own status, read from one
    /// snapshot. `None` when the pharmacy has no queue yet.
    pub fn queue_status(&self, pharmacy_id: &str, queue_number: i64) -> Result<Option<QueueStatusRow>> {
        self.with_conn(|conn| {
            let tx = conn.unchecked_transaction()?;

            let counters: Option<(i64, i64)> = tx
                .query_row(
                    "SELECT current_number, estimated_wait_minutes FROM queues WHERE pharmacy_id = ?1",
                    [pharmacy_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((current_number, estimated_wait_minutes)) = counters else {
                return Ok(None);
            };

            let position = count_ahead(&tx, pharmacy_id, queue_number)?;

            let ticket_status: Option<String> = tx
                .query_row(
                    "SELECT status FROM check_ins WHERE pharmacy_id = ?1 AND queue_number = ?2",
                    rusqlite::params![pharmacy_id, queue_number],
                    |row| row.get(0),
                )
                .optional()?;

            tx.finish()?;

            Ok(Some(QueueStatusRow {
                current_number,
                estimated_wait_minutes,
                position,
                ticket_status,
            }))
        })
    }

    // -- Check-ins --

    pub fn get_check_in(&self, id: &str) -> Result<Option<CheckInRow>> {
        self.with_conn(|conn| query_check_in(conn, "WHERE id = ?1", rusqlite::params![id]))
    }

    /// Waiting check-ins at a pharmacy in ticket order.
    pub fn list_waiting(&self, pharmacy_id: &str) -> Result<Vec<CheckInRow>> {
        self.with_conn(|conn| {
            let ids: Vec<String> = {
                let mut stmt = conn.prepare(
                    "SELECT id FROM check_ins
                     WHERE pharmacy_id = ?1 AND status = 'waiting'
                     ORDER BY queue_number",
                )?;
                stmt.query_map([pharmacy_id], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<_>, _>>()?
            };

            let mut rows = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(row) = query_check_in(conn, "WHERE id = ?1", rusqlite::params![id])? {
                    rows.push(row);
                }
            }
            Ok(rows)
        })
    }

    /// Deletes the user's waiting ticket. Returns false when nothing matched.
    /// Other tickets keep their numbers.
    pub fn leave_queue(&self, user_id: &str, pharmacy_id: &str, queue_number: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let deleted = conn.execute(
                "DELETE FROM check_ins
                 WHERE user_id = ?1 AND pharmacy_id = ?2 AND queue_number = ?3
                   AND status = 'waiting'",
                rusqlite::params![user_id, pharmacy_id, queue_number],
            )?;
            Ok(deleted == 1)
        })
    }

    // -- Pickups --

    pub fn list_pickups(&self, user_id: &str) -> Result<Vec<PickupRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, medication, quantity, pickup_date FROM pickups
                 WHERE user_id = ?1
                 ORDER BY pickup_date DESC, rowid DESC",
            )?;
            let rows = stmt
                .query_map([user_id], |row| {
                    Ok(PickupRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        medication: row.get(2)?,
                        quantity: row.get(3)?,
                        pickup_date: row.get(4)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn query_profile(conn: &Connection, filter: &str, value: &str) -> Result<Option<ProfileRow>> {
    let sql = format!(
        "SELECT id, national_id_hash, sus_card_hash, full_name, push_token, created_at
         FROM profiles {}",
        filter
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(ProfileRow {
                id: row.get(0)?,
                national_id_hash: row.get(1)?,
                sus_card_hash: row.get(2)?,
                full_name: row.get(3)?,
                push_token: row.get(4)?,
                created_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}

pub(crate) fn query_check_in(
    conn: &Connection,
    filter: &str,
    params: impl rusqlite::Params,
) -> Result<Option<CheckInRow>> {
    let sql = format!(
        "SELECT id, user_id, pharmacy_id, queue_number, status, created_at
         FROM check_ins {}
         ORDER BY queue_number
         LIMIT 1",
        filter
    );

    let row = conn
        .query_row(&sql, params, |row| {
            Ok(CheckInRow {
                id: row.get(0)?,
                user_id: row.get(1)?,
                pharmacy_id: row.get(2)?,
                queue_number: row.get(3)?,
                status: row.get(4)?,
                created_at: row.get(5)?,
                items: Vec::new(),
            })
        })
        .optional()?;

    let Some(mut row) = row else {
        return Ok(None);
    };
    row.items = query_items(conn, &row.id)?;
    Ok(Some(row))
}

fn query_items(conn: &Connection, check_in_id: &str) -> Result<Vec<CheckInItemRow>> {
    let mut stmt = conn.prepare(
        "SELECT medication_id, quantity FROM check_in_items
         WHERE check_in_id = ?1
         ORDER BY rowid",
    )?;
    let items = stmt
        .query_map([check_in_id], |row| {
            Ok(CheckInItemRow {
                medication_id: row.get(0)?,
                quantity: row.get(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(items)
}

fn count_ahead(conn: &Connection, pharmacy_id: &str, queue_number: i64) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM check_ins
         WHERE pharmacy_id = ?1 AND queue_number < ?2 AND status = 'waiting'",
        rusqlite::params![pharmacy_id, queue_number],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn pharmacy_from_row(row: &Row<'_>) -> rusqlite::Result<PharmacyRow> {
    Ok(PharmacyRow {
        id: row.get(0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        latitude: row.get(3)?,
        longitude: row.get(4)?,
    })
}

/// Extension trait for optional query results
pub(crate) trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
