//! Connection handling for multi-writer access.
//!
//! Each store call opens its own connection with WAL journaling and a 30 s
//! busy timeout, so concurrent validation runs and the fleet sync can share
//! one database file. On top of SQLite's own busy-wait, an application-level
//! retry loop (5 attempts, exponential from 100 ms) absorbs the residual
//! `SQLITE_BUSY`/`SQLITE_LOCKED` failures under write bursts.

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, ErrorCode, OpenFlags};
use tracing::warn;

use crate::errors::{StoreError, StoreResult};

const BUSY_TIMEOUT_MS: u64 = 30_000;
const MAX_RETRIES: u32 = 5;
const RETRY_DELAY_BASE: Duration = Duration::from_millis(100);

/// Opens a connection with the store pragmas applied.
pub fn open_connection(db_path: &Path) -> StoreResult<Connection> {
    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    conn.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(conn)
}

fn is_contention(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == ErrorCode::DatabaseBusy || err.code == ErrorCode::DatabaseLocked
    )
}

/// Runs `op` on a fresh connection, retrying lock contention with
/// exponential backoff.
///
/// Non-contention errors propagate immediately; contention that survives
/// every attempt surfaces as [`StoreError::Contended`].
pub fn with_retry<T>(
    db_path: &Path,
    op: impl Fn(&mut Connection) -> StoreResult<T>,
) -> StoreResult<T> {
    let mut attempt = 0u32;
    loop {
        let result = open_connection(db_path).and_then(|mut conn| op(&mut conn));
        match result {
            Ok(v) => return Ok(v),
            Err(StoreError::Sqlite(e)) if is_contention(&e) => {
                attempt += 1;
                if attempt >= MAX_RETRIES {
                    return Err(StoreError::Contended {
                        attempts: MAX_RETRIES,
                    });
                }
                let delay = RETRY_DELAY_BASE * 2u32.saturating_pow(attempt - 1);
                warn!(
                    attempt,
                    max = MAX_RETRIES,
                    delay_ms = delay.as_millis() as u64,
                    "database locked, retrying"
                );
                std::thread::sleep(delay);
            }
            Err(e) => return Err(e),
        }
    }
}
