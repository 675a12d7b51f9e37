//! Lead store contract and its SQLite implementation.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use rusqlite::{Connection, OptionalExtension, Row, params};
use thiserror::Error;
use tracing::debug;

use crate::core::types::{Lead, LeadStatus, NewLead, StatePatch, Vertical};

pub const SCHEMA_VERSION: i64 = 1;

const TRACKING_ID_LEN: usize = 24;

const LEAD_COLUMNS: &str = "id, email, domain_name, first_name, vertical, template_slot, status, \
     opened, replied, last_contacted_at, followup_count, tracking_id";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("unsupported schema version {found}, max supported {supported}")]
    UnsupportedSchemaVersion { found: i64, supported: i64 },
}

/// Durable per-lead records consumed by the dispatcher and the signal handlers.
///
/// Every update must be atomic per lead.
pub trait LeadStore {
    /// Insert a new lead (status `new`, counters zero) with a fresh tracking id.
    fn create(&mut self, lead: &NewLead) -> Result<Lead, StoreError>;

    fn get(&self, id: i64) -> Result<Option<Lead>, StoreError>;

    /// Leads with `status = new`, oldest first.
    fn batch_new(&self, limit: usize) -> Result<Vec<Lead>, StoreError>;

    /// Unreplied contacted leads with budget left, oldest first.
    fn batch_followup_eligible(
        &self,
        limit: usize,
        max_followups: u32,
    ) -> Result<Vec<Lead>, StoreError>;

    /// Record a send. Returns `false` when the lead is missing or has replied.
    fn update_after_send(
        &mut self,
        id: i64,
        status: LeadStatus,
        contacted_at: DateTime<Utc>,
        bump_followup: bool,
    ) -> Result<bool, StoreError>;

    /// Advance the rotating template slot modulo `slots`.
    fn bump_template_slot(&mut self, id: i64, slots: u32) -> Result<bool, StoreError>;

    /// Mark the lead carrying `tracking_id` as opened. Returns rows matched.
    fn set_opened(&mut self, tracking_id: &str) -> Result<usize, StoreError>;

    /// Mark every lead with `email` as replied. Returns rows matched.
    fn set_replied(&mut self, email: &str) -> Result<usize, StoreError>;

    fn all(&self) -> Result<Vec<Lead>, StoreError>;

    /// Persist an engine patch after a confirmed send.
    fn apply_patch(
        &mut self,
        id: i64,
        patch: &StatePatch,
        slots: u32,
    ) -> Result<bool, StoreError> {
        let applied =
            self.update_after_send(id, patch.status, patch.contacted_at, patch.bump_followup)?;
        if applied && patch.next_template_slot.is_some() {
            self.bump_template_slot(id, slots)?;
        }
        Ok(applied)
    }
}

/// Random opaque token used to correlate open signals.
pub fn generate_tracking_id() -> String {
    let mut rng = rand::thread_rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric))
        .map(char::from)
        .take(TRACKING_ID_LEN)
        .collect()
}

/// SQLite-backed lead store.
pub struct SqliteLeadStore {
    conn: Connection,
}

impl SqliteLeadStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "opening lead store");
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    pub fn schema_version(&self) -> Result<i64, StoreError> {
        Ok(self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?)
    }

    pub fn migrate(&self) -> Result<(), StoreError> {
        let current = self.schema_version()?;
        if current > SCHEMA_VERSION {
            return Err(StoreError::UnsupportedSchemaVersion {
                found: current,
                supported: SCHEMA_VERSION,
            });
        }

        if current < 1 {
            let sql = include_str!(concat!(
                env!("CARGO_MANIFEST_DIR"),
                "/migrations/0001_leads.sql"
            ));
            self.conn.execute_batch(sql)?;
            self.conn.execute("PRAGMA user_version = 1", []).map(|_| ())?;
        }

        Ok(())
    }

    fn query_leads(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Lead>, StoreError> {
        let mut statement = self.conn.prepare(sql)?;
        let rows = statement.query_map(params, lead_from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl LeadStore for SqliteLeadStore {
    fn create(&mut self, lead: &NewLead) -> Result<Lead, StoreError> {
        let tracking_id = generate_tracking_id();
        self.conn.execute(
            "
            INSERT INTO leads (email, domain_name, first_name, vertical, template_slot, tracking_id)
            VALUES (?1, ?2, ?3, ?4, 0, ?5)
            ",
            params![
                lead.email,
                lead.domain_name,
                lead.first_name,
                lead.vertical.as_str(),
                tracking_id,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(lead_id = id, email = %lead.email, vertical = %lead.vertical, "lead created");
        Ok(Lead {
            id,
            email: lead.email.clone(),
            domain_name: lead.domain_name.clone(),
            first_name: lead.first_name.clone(),
            vertical: lead.vertical,
            template_slot: 0,
            status: LeadStatus::New,
            opened: false,
            replied: false,
            last_contacted_at: None,
            followup_count: 0,
            tracking_id,
        })
    }

    fn get(&self, id: i64) -> Result<Option<Lead>, StoreError> {
        self.conn
            .query_row(
                &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1"),
                [id],
                lead_from_row,
            )
            .optional()
            .map_err(StoreError::from)
    }

    fn batch_new(&self, limit: usize) -> Result<Vec<Lead>, StoreError> {
        self.query_leads(
            &format!(
                "SELECT {LEAD_COLUMNS} FROM leads WHERE status = 'new' ORDER BY id LIMIT ?1"
            ),
            [limit_param(limit)],
        )
    }

    fn batch_followup_eligible(
        &self,
        limit: usize,
        max_followups: u32,
    ) -> Result<Vec<Lead>, StoreError> {
        self.query_leads(
            &format!(
                "
                SELECT {LEAD_COLUMNS} FROM leads
                WHERE replied = 0
                  AND status IN ('initial_sent', 'followup')
                  AND followup_count < ?1
                ORDER BY id
                LIMIT ?2
                "
            ),
            params![max_followups, limit_param(limit)],
        )
    }

    fn update_after_send(
        &mut self,
        id: i64,
        status: LeadStatus,
        contacted_at: DateTime<Utc>,
        bump_followup: bool,
    ) -> Result<bool, StoreError> {
        let changes = self.conn.execute(
            "
            UPDATE leads
            SET status = ?1,
                last_contacted_at = ?2,
                followup_count = followup_count + ?3
            WHERE id = ?4 AND replied = 0
            ",
            params![
                status.as_str(),
                contacted_at.to_rfc3339(),
                i64::from(bump_followup),
                id
            ],
        )?;
        Ok(changes > 0)
    }

    fn bump_template_slot(&mut self, id: i64, slots: u32) -> Result<bool, StoreError> {
        let changes = self.conn.execute(
            "UPDATE leads SET template_slot = (template_slot + 1) % ?1 WHERE id = ?2",
            params![slots.max(1), id],
        )?;
        Ok(changes > 0)
    }

    fn set_opened(&mut self, tracking_id: &str) -> Result<usize, StoreError> {
        let changes = self.conn.execute(
            "UPDATE leads SET opened = 1 WHERE tracking_id = ?1 AND replied = 0",
            [tracking_id],
        )?;
        Ok(changes)
    }

    fn set_replied(&mut self, email: &str) -> Result<usize, StoreError> {
        let changes = self.conn.execute(
            "UPDATE leads SET replied = 1, status = 'replied' WHERE email = ?1",
            [email],
        )?;
        Ok(changes)
    }

    fn all(&self) -> Result<Vec<Lead>, StoreError> {
        self.query_leads(&format!("SELECT {LEAD_COLUMNS} FROM leads ORDER BY id"), [])
    }

    fn apply_patch(
        &mut self,
        id: i64,
        patch: &StatePatch,
        slots: u32,
    ) -> Result<bool, StoreError> {
        let tx = self.conn.transaction()?;
        let changes = tx.execute(
            "
            UPDATE leads
            SET status = ?1,
                last_contacted_at = ?2,
                followup_count = followup_count + ?3
            WHERE id = ?4 AND replied = 0
            ",
            params![
                patch.status.as_str(),
                patch.contacted_at.to_rfc3339(),
                i64::from(patch.bump_followup),
                id
            ],
        )?;
        if changes > 0 && patch.next_template_slot.is_some() {
            tx.execute(
                "UPDATE leads SET template_slot = (template_slot + 1) % ?1 WHERE id = ?2",
                params![slots.max(1), id],
            )?;
        }
        tx.commit()?;
        Ok(changes > 0)
    }
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn lead_from_row(row: &Row<'_>) -> rusqlite::Result<Lead> {
    let vertical: String = row.get(4)?;
    let status: String = row.get(6)?;
    let last_contacted_at: Option<String> = row.get(9)?;
    Ok(Lead {
        id: row.get(0)?,
        email: row.get(1)?,
        domain_name: row.get(2)?,
        first_name: row.get(3)?,
        vertical: vertical
            .parse::<Vertical>()
            .map_err(|err| conversion_error(4, err))?,
        template_slot: row.get(5)?,
        status: status
            .parse::<LeadStatus>()
            .map_err(|err| conversion_error(6, err))?,
        opened: row.get(7)?,
        replied: row.get(8)?,
        last_contacted_at: last_contacted_at
            .map(|raw| parse_timestamp(&raw))
            .transpose()
            .map_err(|err| conversion_error(9, err))?,
        followup_count: row.get(10)?,
        tracking_id: row.get(11)?,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| format!("invalid timestamp '{raw}': {err}"))
}

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        Box::<dyn std::error::Error + Send + Sync>::from(message),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixed_now, new_lead_input};
    use chrono::Duration as TimeDelta;

    fn store_with(leads: &[NewLead]) -> (SqliteLeadStore, Vec<Lead>) {
        let mut store = SqliteLeadStore::open_in_memory().expect("store");
        let created = leads
            .iter()
            .map(|lead| store.create(lead).expect("create"))
            .collect();
        (store, created)
    }

    #[test]
    fn create_assigns_id_and_unique_tracking_id() {
        let (store, created) = store_with(&[
            new_lead_input("a@example.com", "BedOrder.com"),
            new_lead_input("b@example.com", "CloudDesk.io"),
        ]);
        assert_ne!(created[0].id, created[1].id);
        assert_ne!(created[0].tracking_id, created[1].tracking_id);
        assert_eq!(created[0].tracking_id.len(), TRACKING_ID_LEN);

        let loaded = store.get(created[0].id).expect("get").expect("lead");
        assert_eq!(loaded, created[0]);
        assert_eq!(loaded.status, LeadStatus::New);
        assert_eq!(store.schema_version().expect("version"), SCHEMA_VERSION);
    }

    #[test]
    fn batch_new_is_fifo_and_capped() {
        let (mut store, created) = store_with(&[
            new_lead_input("a@example.com", "a.com"),
            new_lead_input("b@example.com", "b.com"),
            new_lead_input("c@example.com", "c.com"),
        ]);
        store
            .update_after_send(created[0].id, LeadStatus::InitialSent, fixed_now(), false)
            .expect("update");

        let batch = store.batch_new(1).expect("batch");
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].id, created[1].id);
    }

    #[test]
    fn followup_batch_excludes_exhausted_and_replied() {
        let (mut store, created) = store_with(&[
            new_lead_input("a@example.com", "a.com"),
            new_lead_input("b@example.com", "b.com"),
            new_lead_input("c@example.com", "c.com"),
            new_lead_input("d@example.com", "d.com"),
        ]);
        let now = fixed_now();
        for lead in &created[..3] {
            store
                .update_after_send(lead.id, LeadStatus::InitialSent, now, false)
                .expect("update");
        }
        for _ in 0..2 {
            store
                .update_after_send(created[1].id, LeadStatus::Followup, now, true)
                .expect("bump");
        }
        store.set_replied("c@example.com").expect("reply");

        let ids: Vec<i64> = store
            .batch_followup_eligible(10, 2)
            .expect("batch")
            .iter()
            .map(|lead| lead.id)
            .collect();
        assert_eq!(ids, vec![created[0].id]);

        let ids: Vec<i64> = store
            .batch_followup_eligible(10, 3)
            .expect("batch")
            .iter()
            .map(|lead| lead.id)
            .collect();
        assert_eq!(ids, vec![created[0].id, created[1].id]);
    }

    #[test]
    fn apply_patch_updates_status_timestamp_and_slot() {
        let (mut store, created) = store_with(&[new_lead_input("a@example.com", "a.com")]);
        let now = fixed_now();
        let patch = StatePatch {
            status: LeadStatus::InitialSent,
            contacted_at: now,
            bump_followup: false,
            next_template_slot: Some(1),
        };
        assert!(store.apply_patch(created[0].id, &patch, 3).expect("apply"));

        let lead = store.get(created[0].id).expect("get").expect("lead");
        assert_eq!(lead.status, LeadStatus::InitialSent);
        assert_eq!(lead.last_contacted_at, Some(now));
        assert_eq!(lead.template_slot, 1);
        assert_eq!(lead.followup_count, 0);
    }

    #[test]
    fn template_slot_wraps_modulo_slot_count() {
        let (mut store, created) = store_with(&[new_lead_input("a@example.com", "a.com")]);
        let id = created[0].id;
        for _ in 0..3 {
            store.bump_template_slot(id, 3).expect("bump");
        }
        assert_eq!(store.get(id).expect("get").expect("lead").template_slot, 0);
        store.bump_template_slot(id, 3).expect("bump");
        assert_eq!(store.get(id).expect("get").expect("lead").template_slot, 1);
    }

    #[test]
    fn replied_lead_is_frozen() {
        let (mut store, created) = store_with(&[new_lead_input("a@example.com", "a.com")]);
        let lead = &created[0];
        assert_eq!(store.set_replied("a@example.com").expect("reply"), 1);

        let applied = store
            .update_after_send(
                lead.id,
                LeadStatus::Followup,
                fixed_now() + TimeDelta::days(1),
                true,
            )
            .expect("update");
        assert!(!applied);
        assert_eq!(store.set_opened(&lead.tracking_id).expect("open"), 0);

        let loaded = store.get(lead.id).expect("get").expect("lead");
        assert_eq!(loaded.status, LeadStatus::Replied);
        assert!(loaded.replied);
        assert!(!loaded.opened);
        assert_eq!(loaded.followup_count, 0);
    }

    #[test]
    fn set_opened_is_idempotent_and_ignores_unknown_ids() {
        let (mut store, created) = store_with(&[new_lead_input("a@example.com", "a.com")]);
        let tid = created[0].tracking_id.clone();
        assert_eq!(store.set_opened(&tid).expect("open"), 1);
        assert_eq!(store.set_opened(&tid).expect("open again"), 1);
        assert_eq!(store.set_opened("nope").expect("unknown"), 0);
        assert!(store.get(created[0].id).expect("get").expect("lead").opened);
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("emails.db");
        let id = {
            let mut store = SqliteLeadStore::open(&path).expect("open");
            store
                .create(&new_lead_input("a@example.com", "a.com"))
                .expect("create")
                .id
        };
        let store = SqliteLeadStore::open(&path).expect("reopen");
        assert_eq!(store.all().expect("all").len(), 1);
        assert!(store.get(id).expect("get").is_some());
    }
}
