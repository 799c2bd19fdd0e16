// Copyright 2019 Fullstop000 <fullstop1005@gmail.com>.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// See the License for the specific language governing permissions and
// limitations under the License.

//! The only external coupling this crate has: a relational store with
//! two tables,
//!
//! ```text
//!     blob(rid INTEGER PRIMARY KEY, uuid TEXT UNIQUE, content BLOB)
//!     delta(rid INTEGER, srcid INTEGER)
//! ```
//!
//! `Storage` is a trait so the on-disk format stays pluggable rather than
//! wiring callers directly to one backend. `SqliteStorage` is the only
//! production implementation; it also happens to be the only engine the
//! format is ever actually stored in, so the abstraction mostly earns its
//! keep in tests (`tests/repository.rs` builds throwaway in-memory
//! databases rather than a second `Storage` impl).

use std::fmt;

use rusqlite::{Connection, OpenFlags, OptionalExtension};

use crate::error::{RepoError, Result, Status};

/// A row from the `blob` table, as returned mid-chain-walk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlobRow {
    pub rid: i64,
    pub uuid: String,
    pub content: Vec<u8>,
}

/// Which column a point lookup is keyed on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Column {
    Rid,
    Uuid,
}

/// Disambiguates a chain-resolution key by the caller's actual intent
/// rather than by guessing at the string's shape. `uuid` is only
/// constrained to be a lowercase hex hash (§3) — an all-numeric uuid is
/// syntactically valid, so a decimal-string heuristic would silently
/// misroute it to a `rid` lookup. The Python original never has this
/// ambiguity because it dispatches on `isinstance(key, int)`; this enum is
/// the Rust equivalent of that type-directed dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Key {
    Rid(i64),
    Uuid(String),
}

impl From<i64> for Key {
    fn from(rid: i64) -> Self {
        Key::Rid(rid)
    }
}

impl From<String> for Key {
    fn from(uuid: String) -> Self {
        Key::Uuid(uuid)
    }
}

impl From<&str> for Key {
    fn from(uuid: &str) -> Self {
        Key::Uuid(uuid.to_string())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Rid(rid) => write!(f, "{rid}"),
            Key::Uuid(uuid) => write!(f, "{uuid}"),
        }
    }
}

/// The query surface the core needs from the relational store.
///
/// `Send` (but deliberately not `Sync`) so the optional `sync` feature can
/// move a boxed `Storage` into a `Mutex` without requiring every backend
/// to support concurrent access internally — a single `Repository` stays
/// single-threaded cooperative on its own.
pub trait Storage: Send {
    /// Issues the recursive chain-expansion query for the blob identified
    /// by `key` (a prefix match is *not* performed here — `key` must carry
    /// the literal rid or full uuid). Returns rows ordered target-first
    /// (depth 0) down to the undeltified ancestor last, or an empty vec
    /// if `key` does not resolve to any blob.
    fn chain(&self, key: &Key) -> Result<Vec<BlobRow>>;

    /// The first `(rid, uuid)` whose uuid starts with `hex_prefix`,
    /// case-sensitively. `None` if nothing matches.
    fn prefix(&self, hex_prefix: &str) -> Result<Option<(i64, String)>>;

    /// A simple `rid -> uuid` or `uuid -> rid` lookup. Returns `(rid,
    /// uuid)` either way so callers don't need to branch.
    fn point_lookup(&self, column: Column, value: &str) -> Result<(i64, String)>;
}

/// A `Storage` backed by a read-only SQLite connection, matching the
/// format's actual on-disk representation.
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens `path` read-only and enables case-sensitive `LIKE` matching
    /// on the connection.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(RepoError::from)?;
        conn.execute_batch("PRAGMA case_sensitive_like = 1;")
            .map_err(RepoError::from)?;
        Ok(Self { conn })
    }

    /// Wraps an already-open connection (e.g. an in-memory database built
    /// by a test) rather than opening a path.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA case_sensitive_like = 1;")
            .map_err(RepoError::from)?;
        Ok(Self { conn })
    }
}

impl Storage for SqliteStorage {
    fn chain(&self, key: &Key) -> Result<Vec<BlobRow>> {
        let column_name = match key {
            Key::Rid(_) => "rid",
            Key::Uuid(_) => "uuid",
        };
        // target row sits at depth 0; each step toward the undeltified
        // ancestor decrements depth, so ORDER BY depth DESC yields
        // target-first, ancestor-last. `chain::reconstruct` reverses this
        // client-side to apply deltas forward from the ancestor.
        let sql = format!(
            "WITH RECURSIVE b(rid, uuid, content, depth) AS ( \
                 SELECT rid, uuid, content, 0 FROM blob WHERE {column_name} = ?1 \
                 UNION ALL \
                 SELECT blob.rid, blob.uuid, blob.content, b.depth - 1 \
                 FROM blob, delta, b \
                 WHERE delta.rid = b.rid AND blob.rid = delta.srcid \
             ) SELECT rid, uuid, content FROM b ORDER BY depth DESC"
        );
        let mut stmt = self.conn.prepare(&sql).map_err(RepoError::from)?;
        let row_mapper = |row: &rusqlite::Row<'_>| {
            Ok(BlobRow {
                rid: row.get(0)?,
                uuid: row.get(1)?,
                content: row.get(2)?,
            })
        };
        let rows = match key {
            Key::Rid(rid) => stmt.query_map([*rid], row_mapper),
            Key::Uuid(uuid) => stmt.query_map([uuid.as_str()], row_mapper),
        }
        .map_err(RepoError::from)?
        .collect::<rusqlite::Result<Vec<_>>>()
        .map_err(RepoError::from)?;
        Ok(rows)
    }

    fn prefix(&self, hex_prefix: &str) -> Result<Option<(i64, String)>> {
        let pattern = format!("{hex_prefix}%");
        self.conn
            .query_row(
                "SELECT rid, uuid FROM blob WHERE uuid LIKE ?1",
                [pattern],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(RepoError::from)
    }

    fn point_lookup(&self, column: Column, value: &str) -> Result<(i64, String)> {
        let sql = match column {
            Column::Rid => "SELECT rid, uuid FROM blob WHERE rid = ?1",
            Column::Uuid => "SELECT rid, uuid FROM blob WHERE uuid = ?1",
        };
        self.conn
            .query_row(sql, [value], |row| Ok((row.get(0)?, row.get(1)?)))
            .map_err(|e| {
                if matches!(e, rusqlite::Error::QueryReturnedNoRows) {
                    RepoError::new(Status::NotFound, Some(&format!("no such blob: {value}")))
                } else {
                    RepoError::from(e)
                }
            })
    }
}

#[cfg(test)]
pub(crate) fn seed_schema(conn: &Connection) {
    conn.execute_batch(
        "CREATE TABLE blob(rid INTEGER PRIMARY KEY, uuid TEXT UNIQUE, content BLOB);
         CREATE TABLE delta(rid INTEGER, srcid INTEGER);",
    )
    .unwrap();
}
