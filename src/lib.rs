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

//! Read-only access to a distributed-VCS repository stored as a single
//! relational archive file.
//!
//! A repository is a pool of compressed, content-addressed blobs. Most
//! are stored as binary deltas against another blob and are reconstructed
//! by walking a chain of predecessors back to an undeltified ancestor and
//! applying deltas forward from there. A second class of blob — the
//! *structural artifact* — carries repository metadata (manifests, tags,
//! wiki pages, tickets, technotes) in a line-oriented card grammar.
//!
//! ```no_run
//! use fossil_archive::Repository;
//!
//! # fn main() -> fossil_archive::Result<()> {
//! let mut repo = Repository::open("/path/to/repo.fossil")?;
//! let artifact = repo.lookup_structural("a1b2c3d4")?;
//! if let Some(cards) = artifact.cards() {
//!     println!("{:?}", cards.get("comment")?);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! This crate has no write path, no network sync, no signature
//! verification (clear-signed wrappers are stripped, never checked for
//! validity), and no CLI — it only reads.

mod artifact;
mod blob;
mod cache;
mod card;
mod chain;
mod checksum;
mod clearsign;
mod delta;
mod error;
mod repo;
mod storage;
mod varint;

#[cfg(feature = "sync")]
mod sync;

pub use artifact::{Artifact, RawId};
pub use card::{CardEntry, CardMap, CardValue};
pub use error::{RepoError, Result, Status};
pub use repo::{OpenOptions, Repository};
pub use storage::{BlobRow, Column, Key, SqliteStorage, Storage};

#[cfg(feature = "sync")]
pub use sync::SyncRepository;

// Exposed for callers who want to exercise the codec/checksum/delta
// layers directly (e.g. validating a delta produced out of band) without
// going through a full `Repository`.
pub mod codec {
    pub use crate::checksum::checksum;
    pub use crate::delta::apply as apply_delta;
    pub use crate::varint::{decode as decode_varint, encode as encode_varint};
}
