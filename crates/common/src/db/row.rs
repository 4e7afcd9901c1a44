//! Result guards that own the connection a statement ran on
//!
//! A tenant-bound connection must not outlive the caller's look at its
//! result. `Row` gives the connection back on `scan`, `Rows` on `close`, and
//! both on drop. Results from the raw pool carry no connection.

use crate::errors::{AppError, Result};
use crate::metrics;
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Postgres};
use tracing::{debug, warn};

/// Command tag of an executed statement
pub type CommandTag = sqlx::postgres::PgQueryResult;

/// Single-row result
pub struct Row {
    conn: Option<PoolConnection<Postgres>>,
    row: Option<PgRow>,
    scanned: bool,
}

impl Row {
    pub(crate) fn new(conn: Option<PoolConnection<Postgres>>, row: Option<PgRow>) -> Self {
        Self {
            conn,
            row,
            scanned: false,
        }
    }

    /// Whether the statement produced a row
    pub fn is_empty(&self) -> bool {
        self.row.is_none()
    }

    /// Decode the row and release the connection, whether decoding
    /// succeeds or not. No row is `AppError::NoRows`.
    pub fn scan<T>(mut self) -> Result<T>
    where
        T: for<'r> FromRow<'r, PgRow>,
    {
        self.scanned = true;
        let conn = self.conn.take();
        let result = match self.row.take() {
            Some(row) => T::from_row(&row).map_err(AppError::from),
            None => Err(AppError::NoRows),
        };
        drop(conn);
        result
    }
}

impl Drop for Row {
    fn drop(&mut self) {
        if !self.scanned && self.conn.is_some() {
            metrics::record_row_dropped();
            warn!("Tenant-bound row dropped without scan; releasing its connection");
        }
    }
}

impl std::fmt::Debug for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Row")
            .field("bound", &self.conn.is_some())
            .field("empty", &self.row.is_none())
            .finish()
    }
}

/// Multi-row result. The caller reads with `next` and must `close`;
/// decode errors do not release the connection on their own.
pub struct Rows {
    conn: Option<PoolConnection<Postgres>>,
    rows: std::vec::IntoIter<PgRow>,
    closed: bool,
}

impl Rows {
    pub(crate) fn new(conn: Option<PoolConnection<Postgres>>, rows: Vec<PgRow>) -> Self {
        Self {
            conn,
            rows: rows.into_iter(),
            closed: false,
        }
    }

    /// Rows not yet read
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }

    /// Decode the next row
    #[allow(clippy::should_implement_trait)]
    pub fn next<T>(&mut self) -> Option<Result<T>>
    where
        T: for<'r> FromRow<'r, PgRow>,
    {
        self.rows
            .next()
            .map(|row| T::from_row(&row).map_err(AppError::from))
    }

    /// Release the connection
    pub fn close(mut self) {
        self.release();
    }

    /// Decode every remaining row, then close. The connection is released
    /// even when a row fails to decode.
    pub fn scan_all<T>(mut self) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, PgRow>,
    {
        let mut out = Vec::with_capacity(self.rows.len());
        let result = loop {
            match self.next::<T>() {
                Some(Ok(item)) => out.push(item),
                Some(Err(e)) => break Err(e),
                None => break Ok(()),
            }
        };
        self.release();
        result.map(|_| out)
    }

    fn release(&mut self) {
        self.closed = true;
        self.conn.take();
    }
}

impl Drop for Rows {
    fn drop(&mut self) {
        if !self.closed && self.conn.is_some() {
            debug!("Tenant-bound rows dropped without close; releasing its connection");
        }
    }
}

impl std::fmt::Debug for Rows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rows")
            .field("bound", &self.conn.is_some())
            .field("remaining", &self.rows.len())
            .finish()
    }
}
