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

//! Resolves an identifier to a reconstructed blob by walking its delta
//! chain from the undeltified ancestor down to the requested target.
//!
//! [`Storage::chain`] does the graph walk in one recursive query and
//! returns rows in reverse-depth order: the requested blob first, then
//! its delta source, and so on down to the undeltified ancestor. This
//! resolver then iterates that result set back-to-front — ancestor
//! toward target — decompressing or delta-applying one step at a time and
//! populating the cache as it goes.

use crate::blob;
use crate::cache::LruCache;
use crate::delta;
use crate::error::{RepoError, Result, Status};
use crate::storage::{BlobRow, Key, Storage};

/// The reconstructed blob for the requested identifier, plus the ids of
/// the row that was actually requested (the target, not the ancestor).
pub struct Resolved {
    pub rid: i64,
    pub uuid: String,
    pub content: Vec<u8>,
}

/// Walks `rows` (ancestor-first order expected) and reconstructs the
/// target blob, consulting and updating `cache` along the way.
///
/// `lookup_key` is only used to build the `NotFound` error message when
/// `rows` is empty — it must never be derived from a partially-resolved
/// row id (see DESIGN.md's "chain query returns nothing" decision).
pub fn reconstruct(
    storage: &dyn Storage,
    cache: &mut LruCache,
    lookup_key: &Key,
    verify: bool,
    validate_blob_header: bool,
) -> Result<Resolved> {
    let rows = storage.chain(lookup_key)?;
    if rows.is_empty() {
        return Err(RepoError::new(
            Status::NotFound,
            Some(&format!("can't find artifact: {lookup_key}")),
        ));
    }

    if rows.len() > 1 {
        log::debug!(
            "reconstructing {} via a chain of {} blob(s)",
            lookup_key,
            rows.len()
        );
    }

    // rows arrive target-first/ancestor-last (depth 0 first); reconstruction
    // must proceed ancestor -> target, so walk the slice in reverse.
    let target = rows.first().expect("checked non-empty above");
    let target_rid = target.rid;
    let target_uuid = target.uuid.clone();

    let mut working: Option<Vec<u8>> = None;

    for row in rows.iter().rev() {
        if let Some(cached) = cache.get(row.rid) {
            working = Some(cached.to_vec());
            continue;
        }
        let next = match working {
            None => {
                if validate_blob_header {
                    blob::decompress_checked(&row.content)?
                } else {
                    blob::decompress(&row.content)?
                }
            }
            Some(ref base) => {
                let raw_delta = if validate_blob_header {
                    blob::decompress_checked(&row.content)?
                } else {
                    blob::decompress(&row.content)?
                };
                delta::apply(base, &raw_delta, verify)?
            }
        };
        cache.insert(row.rid, next.clone());
        working = Some(next);
    }

    let content = working.expect("at least one row was processed");
    Ok(Resolved {
        rid: target_rid,
        uuid: target_uuid,
        content,
    })
}
