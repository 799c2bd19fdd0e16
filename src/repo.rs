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

//! The public entry point: a read-only handle on one repository archive.
//!
//! A `Repository` owns its storage connection and its LRU cache
//! exclusively and releases both deterministically on drop. It is
//! single-threaded cooperative: every operation runs to completion before
//! returning, there is no cancellation, and the struct itself carries no
//! internal locking (see the `sync` feature for an opt-in wrapper).

use std::sync::Once;

use crate::artifact::{Artifact, RawId};
use crate::cache::LruCache;
use crate::card::CardMap;
use crate::chain;
use crate::error::Result;
use crate::storage::{Column, Key, SqliteStorage, Storage};

static VERIFY_WARNING: Once = Once::new();

const DEFAULT_CACHE_CAPACITY: usize = 64;

/// Configuration for [`Repository::open_with`], an `Options`/`ReadOptions`
/// style builder rather than a long positional-argument `open` call.
#[derive(Clone, Copy, Debug)]
pub struct OpenOptions {
    verify: bool,
    cache_capacity: usize,
    validate_blob_header: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            verify: false,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            validate_blob_header: false,
        }
    }
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables checksum verification on every delta application. Slower,
    /// and there is no SIMD-accelerated path in this crate, so enabling
    /// it logs a one-time warning.
    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Sets the LRU cache capacity. `0` disables caching entirely.
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Opt-in strict mode for the blob header's declared original size;
    /// off by default to match observed repository behavior (see
    /// DESIGN.md).
    pub fn validate_blob_header(mut self, validate: bool) -> Self {
        self.validate_blob_header = validate;
        self
    }
}

/// A read-only handle on one repository archive.
pub struct Repository {
    storage: Box<dyn Storage>,
    cache: LruCache,
    verify: bool,
    validate_blob_header: bool,
}

impl Repository {
    /// Opens `path` with default options (`verify = false`, cache
    /// capacity 64).
    pub fn open(path: &str) -> Result<Self> {
        Self::open_with(path, OpenOptions::default())
    }

    /// Opens `path` with explicit options.
    pub fn open_with(path: &str, options: OpenOptions) -> Result<Self> {
        if options.verify {
            VERIFY_WARNING.call_once(|| {
                log::warn!(
                    "checksum verification enabled; this build has no SIMD-accelerated \
                     checksum path, falling back to the scalar word-sum"
                );
            });
        }
        let storage = SqliteStorage::open(path)?;
        Ok(Self::from_storage(Box::new(storage), options))
    }

    /// Builds a façade over an already-open storage backend — the seam
    /// tests use to avoid touching the filesystem.
    pub(crate) fn from_storage(storage: Box<dyn Storage>, options: OpenOptions) -> Self {
        Self {
            storage,
            cache: LruCache::new(options.cache_capacity),
            verify: options.verify,
            validate_blob_header: options.validate_blob_header,
        }
    }

    /// Looks up `key` — an `i64` rid or a `&str`/`String` uuid, converted
    /// via [`Into<Key>`] — and returns it as a `Raw` artifact.
    ///
    /// The key's *type* decides rid vs. uuid, never the shape of a string:
    /// a uuid is only guaranteed to be lowercase hex (§3), so an
    /// all-numeric uuid is syntactically valid and must not be guessed at.
    pub fn lookup<K: Into<Key>>(&mut self, key: K) -> Result<Artifact> {
        let resolved = self.reconstruct(&key.into())?;
        Ok(Artifact::Raw {
            id: RawId { rid: resolved.rid, uuid: resolved.uuid },
            content: resolved.content,
        })
    }

    /// As [`Repository::lookup`], tagged as a `File` artifact.
    pub fn lookup_file<K: Into<Key>>(&mut self, key: K) -> Result<Artifact> {
        let resolved = self.reconstruct(&key.into())?;
        Ok(Artifact::File {
            id: RawId { rid: resolved.rid, uuid: resolved.uuid },
            content: resolved.content,
        })
    }

    /// As [`Repository::lookup`], parsed through the card grammar and
    /// tagged as a `Structural` artifact.
    pub fn lookup_structural<K: Into<Key>>(&mut self, key: K) -> Result<Artifact> {
        let resolved = self.reconstruct(&key.into())?;
        let cards = CardMap::parse(&resolved.content)?;
        Ok(Artifact::Structural {
            id: RawId { rid: resolved.rid, uuid: resolved.uuid },
            cards,
        })
    }

    /// The first `(rid, uuid)` whose uuid starts with `hex_prefix`.
    pub fn find_by_prefix(&self, hex_prefix: &str) -> Result<(i64, String)> {
        match self.storage.prefix(hex_prefix)? {
            Some(found) => Ok(found),
            None => Err(crate::error::RepoError::new(
                crate::error::Status::NotFound,
                Some(&format!("no blob with prefix {hex_prefix}")),
            )),
        }
    }

    pub fn rid_to_uuid(&self, rid: i64) -> Result<String> {
        self.storage
            .point_lookup(Column::Rid, &rid.to_string())
            .map(|(_, uuid)| uuid)
    }

    pub fn uuid_to_rid(&self, uuid: &str) -> Result<i64> {
        self.storage
            .point_lookup(Column::Uuid, uuid)
            .map(|(rid, _)| rid)
    }

    fn reconstruct(&mut self, key: &Key) -> Result<chain::Resolved> {
        chain::reconstruct(
            self.storage.as_ref(),
            &mut self.cache,
            key,
            self.verify,
            self.validate_blob_header,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::seed_schema;
    use rusqlite::Connection;
    use std::io::Write;

    fn deflate(raw: &[u8]) -> Vec<u8> {
        let mut enc =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(raw).unwrap();
        let body = enc.finish().unwrap();
        let mut out = (raw.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(&body);
        out
    }

    fn repo_with_one_plain_blob(rid: i64, uuid: &str, content: &[u8]) -> Repository {
        let conn = Connection::open_in_memory().unwrap();
        seed_schema(&conn);
        conn.execute(
            "INSERT INTO blob(rid, uuid, content) VALUES (?1, ?2, ?3)",
            rusqlite::params![rid, uuid, deflate(content)],
        )
        .unwrap();
        let storage = SqliteStorage::from_connection(conn).unwrap();
        Repository::from_storage(Box::new(storage), OpenOptions::default())
    }

    #[test]
    fn lookup_by_uuid_returns_raw_artifact() {
        let mut repo = repo_with_one_plain_blob(1, "deadbeef", b"hello");
        let artifact = repo.lookup("deadbeef").unwrap();
        assert_eq!(artifact.content(), Some(&b"hello"[..]));
        assert_eq!(artifact.rid(), 1);
        assert_eq!(artifact.uuid(), "deadbeef");
        assert!(matches!(artifact, Artifact::Raw { .. }));
    }

    #[test]
    fn lookup_by_rid_and_by_uuid_agree() {
        let mut repo = repo_with_one_plain_blob(7, "cafebabe", b"payload");
        let by_rid = repo.lookup(7i64).unwrap();
        let by_uuid = repo.lookup("cafebabe").unwrap();
        assert_eq!(by_rid.content(), by_uuid.content());
    }

    #[test]
    fn all_numeric_uuid_is_not_misrouted_to_a_rid_lookup() {
        // "123" is a syntactically valid (if unusual) lowercase-hex uuid;
        // rid 123 does not exist in this fixture, so a rid-keyed lookup
        // must miss even though the string looks numeric.
        let mut repo = repo_with_one_plain_blob(1, "123", b"payload");
        let by_uuid = repo.lookup("123").unwrap();
        assert_eq!(by_uuid.content(), Some(&b"payload"[..]));
        assert!(repo.lookup(123i64).unwrap_err().is_not_found());
    }

    #[test]
    fn lookup_file_tags_as_file_variant() {
        let mut repo = repo_with_one_plain_blob(1, "deadbeef", b"hello");
        let artifact = repo.lookup_file("deadbeef").unwrap();
        assert!(matches!(artifact, Artifact::File { .. }));
    }

    #[test]
    fn lookup_structural_parses_cards() {
        let mut repo = repo_with_one_plain_blob(1, "deadbeef", b"C hi\nZ deadbeef\n");
        let artifact = repo.lookup_structural("deadbeef").unwrap();
        let cards = artifact.cards().unwrap();
        assert_eq!(
            cards.get("C").unwrap().single().unwrap(),
            &crate::card::CardValue::Text("hi".into())
        );
    }

    #[test]
    fn not_found_for_unknown_key() {
        let mut repo = repo_with_one_plain_blob(1, "deadbeef", b"hello");
        let err = repo.lookup("ffffffff").unwrap_err();
        assert!(err.is_not_found());
        assert!(err.description().contains("ffffffff"));
    }

    #[test]
    fn find_by_prefix_not_found_is_explicit() {
        let repo = repo_with_one_plain_blob(1, "deadbeef", b"hello");
        let err = repo.find_by_prefix("ffff").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn rid_uuid_round_trip() {
        let repo = repo_with_one_plain_blob(5, "feedface", b"x");
        assert_eq!(repo.rid_to_uuid(5).unwrap(), "feedface");
        assert_eq!(repo.uuid_to_rid("feedface").unwrap(), 5);
    }

    #[test]
    fn cache_capacity_zero_disables_caching_without_changing_results() {
        let conn = Connection::open_in_memory().unwrap();
        seed_schema(&conn);
        conn.execute(
            "INSERT INTO blob(rid, uuid, content) VALUES (1, 'aaaa', ?1)",
            rusqlite::params![deflate(b"ancestor")],
        )
        .unwrap();
        let storage = SqliteStorage::from_connection(conn).unwrap();
        let mut repo = Repository::from_storage(
            Box::new(storage),
            OpenOptions::new().cache_capacity(0),
        );
        let a = repo.lookup("aaaa").unwrap();
        let b = repo.lookup("aaaa").unwrap();
        assert_eq!(a.content(), b.content());
    }
}
