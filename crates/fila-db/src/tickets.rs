//! Ticket issuance and service. Each operation here runs as a single
//! `IMMEDIATE` transaction, so the queue counter and the check-in rows it
//! numbers are always written together or not at all.

use anyhow::Result;
use rusqlite::TransactionBehavior;
use tracing::debug;
use uuid::Uuid;

use crate::Database;
use crate::models::{CheckInItemRow, CheckInRow};
use crate::queries::{OptionalExt, query_check_in};

pub struct NewCheckIn<'a> {
    pub check_in_id: &'a str,
    /// Used only when this join creates the pharmacy's queue.
    pub queue_id: &'a str,
    pub user_id: &'a str,
    pub pharmacy_id: &'a str,
    pub items: &'a [CheckInItemRow],
    pub default_wait_minutes: i64,
}

#[derive(Debug)]
pub enum JoinOutcome {
    /// A fresh ticket was issued.
    Issued(CheckInRow),
    /// The user already holds a waiting ticket here; it is returned unchanged.
    AlreadyWaiting(CheckInRow),
    PharmacyNotFound,
    /// The signed-in profile no longer exists.
    ProfileNotFound,
    /// A selected medication is not stocked by this pharmacy.
    UnknownMedication(String),
}

impl Database {
    /// Issues the next ticket for a pharmacy and records the check-in.
    ///
    /// The counter increment is a single `INSERT .. ON CONFLICT DO UPDATE ..
    /// RETURNING`, so two joins can never observe the same `current_number`.
    pub fn join_queue(&self, new: &NewCheckIn<'_>) -> Result<JoinOutcome> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let pharmacy_exists: Option<i64> = tx
                .query_row("SELECT 1 FROM pharmacies WHERE id = ?1", [new.pharmacy_id], |row| row.get(0))
                .optional()?;
            if pharmacy_exists.is_none() {
                return Ok(JoinOutcome::PharmacyNotFound);
            }

            let profile_exists: Option<i64> = tx
                .query_row("SELECT 1 FROM profiles WHERE id = ?1", [new.user_id], |row| row.get(0))
                .optional()?;
            if profile_exists.is_none() {
                return Ok(JoinOutcome::ProfileNotFound);
            }

            for item in new.items {
                let stocked: Option<i64> = tx
                    .query_row(
                        "SELECT 1 FROM medications WHERE id = ?1 AND pharmacy_id = ?2",
                        rusqlite::params![item.medication_id, new.pharmacy_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                if stocked.is_none() {
                    return Ok(JoinOutcome::UnknownMedication(item.medication_id.clone()));
                }
            }

            if let Some(existing) = query_check_in(
                &tx,
                "WHERE user_id = ?1 AND pharmacy_id = ?2 AND status = 'waiting'",
                rusqlite::params![new.user_id, new.pharmacy_id],
            )? {
                return Ok(JoinOutcome::AlreadyWaiting(existing));
            }

            let queue_number: i64 = tx.query_row(
                "INSERT INTO queues (id, pharmacy_id, current_number, estimated_wait_minutes)
                 VALUES (?1, ?2, 1, ?3)
                 ON CONFLICT(pharmacy_id) DO UPDATE SET current_number = current_number + 1
                 RETURNING current_number",
                rusqlite::params![new.queue_id, new.pharmacy_id, new.default_wait_minutes],
                |row| row.get(0),
            )?;

            tx.execute(
                "INSERT INTO check_ins (id, user_id, pharmacy_id, queue_number, status)
                 VALUES (?1, ?2, ?3, ?4, 'waiting')",
                rusqlite::params![new.check_in_id, new.user_id, new.pharmacy_id, queue_number],
            )?;

            {
                let mut stmt = tx.prepare(
                    "INSERT INTO check_in_items (check_in_id, medication_id, quantity) VALUES (?1, ?2, ?3)",
                )?;
                for item in new.items {
                    stmt.execute(rusqlite::params![new.check_in_id, item.medication_id, item.quantity])?;
                }
            }

            let issued = query_check_in(&tx, "WHERE id = ?1", rusqlite::params![new.check_in_id])?
                .ok_or_else(|| anyhow::anyhow!("Check-in {} vanished inside its own transaction", new.check_in_id))?;

            tx.commit()?;

            debug!("Issued ticket {} at pharmacy {}", queue_number, new.pharmacy_id);
            Ok(JoinOutcome::Issued(issued))
        })
    }

    /// Marks the lowest-numbered waiting ticket as served and records one
    /// pickup per requested medication. `None` when nobody is waiting.
    pub fn serve_next(&self, pharmacy_id: &str) -> Result<Option<CheckInRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let Some(mut next) = query_check_in(
                &tx,
                "WHERE pharmacy_id = ?1 AND status = 'waiting'",
                rusqlite::params![pharmacy_id],
            )?
            else {
                return Ok(None);
            };

            tx.execute("UPDATE check_ins SET status = 'served' WHERE id = ?1", [&next.id])?;

            {
                let mut stmt = tx.prepare(
                    "INSERT INTO pickups (id, user_id, medication, quantity)
                     SELECT ?1, ?2, m.name, i.quantity
                     FROM check_in_items i
                     JOIN medications m ON m.id = i.medication_id
                     WHERE i.check_in_id = ?3 AND i.medication_id = ?4",
                )?;
                for item in &next.items {
                    let pickup_id = Uuid::new_v4().to_string();
                    stmt.execute(rusqlite::params![pickup_id, next.user_id, next.id, item.medication_id])?;
                }
            }

            tx.commit()?;

            next.status = "served".to_string();
            debug!("Served ticket {} at pharmacy {}", next.queue_number, pharmacy_id);
            Ok(Some(next))
        })
    }
}
