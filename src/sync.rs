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

//! An opt-in thread-safe wrapper, gated behind the `sync` feature.
//!
//! [`Repository`] itself stays single-threaded cooperative with no
//! locking; `SyncRepository` just serializes access to one with a
//! `parking_lot::Mutex`.

use parking_lot::Mutex;

use crate::artifact::Artifact;
use crate::error::Result;
use crate::repo::Repository;
use crate::storage::Key;

/// A `Repository` that may be shared across threads by serializing every
/// operation through a mutex. No change in lookup semantics versus
/// `Repository` — purely a concurrency-safety wrapper.
pub struct SyncRepository {
    inner: Mutex<Repository>,
}

impl SyncRepository {
    pub fn new(repo: Repository) -> Self {
        Self {
            inner: Mutex::new(repo),
        }
    }

    pub fn lookup<K: Into<Key>>(&self, key: K) -> Result<Artifact> {
        self.inner.lock().lookup(key)
    }

    pub fn lookup_file<K: Into<Key>>(&self, key: K) -> Result<Artifact> {
        self.inner.lock().lookup_file(key)
    }

    pub fn lookup_structural<K: Into<Key>>(&self, key: K) -> Result<Artifact> {
        self.inner.lock().lookup_structural(key)
    }

    pub fn find_by_prefix(&self, hex_prefix: &str) -> Result<(i64, String)> {
        self.inner.lock().find_by_prefix(hex_prefix)
    }

    pub fn rid_to_uuid(&self, rid: i64) -> Result<String> {
        self.inner.lock().rid_to_uuid(rid)
    }

    pub fn uuid_to_rid(&self, uuid: &str) -> Result<i64> {
        self.inner.lock().uuid_to_rid(uuid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repo::OpenOptions;
    use crate::storage::{seed_schema, SqliteStorage};
    use rusqlite::Connection;
    use std::io::Write;
    use std::sync::Arc;

    fn deflate(raw: &[u8]) -> Vec<u8> {
        let mut enc =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(raw).unwrap();
        let body = enc.finish().unwrap();
        let mut out = (raw.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(&body);
        out
    }

    #[test]
    fn shareable_across_threads() {
        let conn = Connection::open_in_memory().unwrap();
        seed_schema(&conn);
        conn.execute(
            "INSERT INTO blob(rid, uuid, content) VALUES (1, 'aaaa', ?1)",
            rusqlite::params![deflate(b"shared content")],
        )
        .unwrap();
        let storage = SqliteStorage::from_connection(conn).unwrap();
        let repo = Repository::from_storage(Box::new(storage), OpenOptions::default());
        let shared = Arc::new(SyncRepository::new(repo));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let shared = Arc::clone(&shared);
            handles.push(std::thread::spawn(move || {
                let artifact = shared.lookup("aaaa").unwrap();
                assert_eq!(artifact.content(), Some(&b"shared content"[..]));
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
    }
}
