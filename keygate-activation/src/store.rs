//! SQLite-backed activation store and state machine.
//!
//! Tracks every hardware id through three states: unseen (no rows),
//! pending (row in `pending`), activated (row in `activations`). A hardware
//! id is never in both tables after a completed operation: the
//! pending-to-activated transition runs inside a single SQLite transaction.
//!
//! ## Tables
//!
//! - `pending` - one redeemable code per hardware id (hashed, plus a short
//!   display sample for audit)
//! - `activations` - completed activations with a code-to-hwid binding hash

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, info};

use crate::code::{activation_hash, generate_code, sha256_hex};
use crate::error::{ActivationError, ActivationResult};

/// Maximum stored device name length, in characters.
pub const MAX_DEVICE_NAME_LEN: usize = 200;

/// How many plaintext characters of a code are kept for audit listings.
const CODE_SAMPLE_LEN: usize = 4;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS pending (
    hwid TEXT PRIMARY KEY,
    code_hash TEXT NOT NULL,
    code_plain_sample TEXT NOT NULL,
    device_name TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS activations (
    hwid TEXT PRIMARY KEY,
    activated_at INTEGER NOT NULL,
    activation_code_hash TEXT NOT NULL,
    device_name TEXT NOT NULL
);
";

/// A freshly issued activation code.
///
/// The plaintext `code` exists only in memory on its way to the
/// notification sink; the store persists a hash.
#[derive(Debug, Clone)]
pub struct IssuedCode {
    /// The plaintext activation code.
    pub code: String,
    /// When the code was issued.
    pub created_at: DateTime<Utc>,
}

/// An audit row for a pending activation. Carries only a truncated code
/// sample, never the full secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingActivation {
    pub hwid: String,
    pub code_sample: String,
    pub device_name: String,
    pub created_at: DateTime<Utc>,
}

/// An audit row for a completed activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationRecord {
    pub hwid: String,
    pub activated_at: DateTime<Utc>,
    pub device_name: String,
}

/// The activation store.
///
/// All access goes through an internal mutex, so concurrent request
/// handlers are serialized per store; the redeem transition additionally
/// runs in a SQLite transaction so no observer can see a hardware id with
/// neither or both records mid-transition.
pub struct ActivationStore {
    conn: Mutex<Connection>,
}

impl ActivationStore {
    /// Opens or creates the activation database at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError::Storage`] if the database cannot be
    /// opened or the schema cannot be initialized.
    pub fn open(path: &Path) -> ActivationResult<Self> {
        info!("opening activation database at {}", path.display());
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::from_connection(conn)
    }

    /// Opens an in-memory store (for testing).
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError::Storage`] if schema init fails.
    pub fn open_in_memory() -> ActivationResult<Self> {
        debug!("opening in-memory activation database");
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> ActivationResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Issues a new activation code for `hwid`.
    ///
    /// See [`ActivationStore::request_activation_at`].
    pub fn request_activation(
        &self,
        hwid: &str,
        device_name: &str,
        code_length: usize,
    ) -> ActivationResult<IssuedCode> {
        self.request_activation_at(hwid, device_name, code_length, Utc::now())
    }

    /// Issues a new activation code for `hwid` at an explicit point in time.
    ///
    /// Any earlier pending code for the same hardware id is replaced and
    /// becomes unredeemable; only the most recently issued code matches the
    /// stored hash.
    ///
    /// # Errors
    ///
    /// - [`ActivationError::Validation`] if `hwid` is empty after trimming
    /// - [`ActivationError::AlreadyActivated`] if the hardware id already
    ///   holds an activation record (no code is issued)
    /// - [`ActivationError::Storage`] on database failure
    pub fn request_activation_at(
        &self,
        hwid: &str,
        device_name: &str,
        code_length: usize,
        now: DateTime<Utc>,
    ) -> ActivationResult<IssuedCode> {
        let hwid = hwid.trim();
        if hwid.is_empty() {
            return Err(ActivationError::Validation("missing hwid".to_string()));
        }
        let device_name = clamp_device_name(device_name);

        let conn = self.lock()?;

        let activated: Option<String> = conn
            .query_row(
                "SELECT hwid FROM activations WHERE hwid = ?1",
                params![hwid],
                |row| row.get(0),
            )
            .optional()?;
        if activated.is_some() {
            return Err(ActivationError::AlreadyActivated);
        }

        let code = generate_code(code_length);
        let code_hash = sha256_hex(&code);
        let sample: String = code.chars().take(CODE_SAMPLE_LEN).collect();

        conn.execute(
            "REPLACE INTO pending (hwid, code_hash, code_plain_sample, device_name, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                hwid,
                code_hash,
                format!("{sample}..."),
                device_name,
                now.timestamp()
            ],
        )?;

        info!("issued pending activation code for hwid {hwid}");
        Ok(IssuedCode {
            code,
            created_at: now,
        })
    }

    /// Redeems an activation code.
    ///
    /// See [`ActivationStore::verify_activation_at`].
    pub fn verify_activation(
        &self,
        hwid: &str,
        code: &str,
        device_name: &str,
        ttl: Duration,
    ) -> ActivationResult<DateTime<Utc>> {
        self.verify_activation_at(hwid, code, device_name, ttl, Utc::now())
    }

    /// Redeems an activation code at an explicit point in time.
    ///
    /// On success the pending record is deleted and an activation record is
    /// inserted, both inside one transaction; the stored activation hash
    /// binds the code to this hardware id.
    ///
    /// # Errors
    ///
    /// - [`ActivationError::Validation`] if `hwid` or `code` is empty
    /// - [`ActivationError::NoPendingRequest`] if no pending code exists
    /// - [`ActivationError::CodeExpired`] if the code outlived `ttl`; the
    ///   pending record is deleted and can never be redeemed
    /// - [`ActivationError::InvalidCode`] on hash mismatch; the pending
    ///   record is retained so the client may retry until TTL expiry
    /// - [`ActivationError::Storage`] on database failure
    pub fn verify_activation_at(
        &self,
        hwid: &str,
        code: &str,
        device_name: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> ActivationResult<DateTime<Utc>> {
        let hwid = hwid.trim();
        let code = code.trim();
        if hwid.is_empty() || code.is_empty() {
            return Err(ActivationError::Validation(
                "missing hwid or activation code".to_string(),
            ));
        }
        let device_name = clamp_device_name(device_name);

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let pending: Option<(String, i64)> = tx
            .query_row(
                "SELECT code_hash, created_at FROM pending WHERE hwid = ?1",
                params![hwid],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let Some((code_hash, created_at)) = pending else {
            return Err(ActivationError::NoPendingRequest);
        };

        if now.timestamp() - created_at > ttl.num_seconds() {
            tx.execute("DELETE FROM pending WHERE hwid = ?1", params![hwid])?;
            tx.commit()?;
            info!("expired pending activation for hwid {hwid}");
            return Err(ActivationError::CodeExpired);
        }

        if sha256_hex(code) != code_hash {
            // Transaction drops without commit; the pending row stays.
            return Err(ActivationError::InvalidCode);
        }

        tx.execute(
            "REPLACE INTO activations (hwid, activated_at, activation_code_hash, device_name)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                hwid,
                now.timestamp(),
                activation_hash(code, hwid),
                device_name
            ],
        )?;
        tx.execute("DELETE FROM pending WHERE hwid = ?1", params![hwid])?;
        tx.commit()?;

        info!("activated hwid {hwid}");
        Ok(now)
    }

    /// Lists pending activations, newest first. Read-only audit projection.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError::Storage`] on database failure.
    pub fn list_pending(&self) -> ActivationResult<Vec<PendingActivation>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT hwid, code_plain_sample, device_name, created_at
             FROM pending ORDER BY created_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (hwid, code_sample, device_name, created_at) = row?;
            out.push(PendingActivation {
                hwid,
                code_sample,
                device_name,
                created_at: timestamp_to_utc(created_at)?,
            });
        }
        Ok(out)
    }

    /// Lists completed activations, newest first. Read-only audit projection.
    ///
    /// # Errors
    ///
    /// Returns [`ActivationError::Storage`] on database failure.
    pub fn list_activations(&self) -> ActivationResult<Vec<ActivationRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT hwid, activated_at, device_name
             FROM activations ORDER BY activated_at DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (hwid, activated_at, device_name) = row?;
            out.push(ActivationRecord {
                hwid,
                activated_at: timestamp_to_utc(activated_at)?,
                device_name,
            });
        }
        Ok(out)
    }

    fn lock(&self) -> ActivationResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ActivationError::Storage("connection lock poisoned".to_string()))
    }
}

fn clamp_device_name(device_name: &str) -> String {
    device_name.trim().chars().take(MAX_DEVICE_NAME_LEN).collect()
}

fn timestamp_to_utc(secs: i64) -> ActivationResult<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| ActivationError::Storage(format!("invalid stored timestamp {secs}")))
}
