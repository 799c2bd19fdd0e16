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

use std::error::Error as StdError;
use std::fmt;

/// A coarse classification of what went wrong.
///
/// `CacheMiss` never appears on a `RepoError` returned from a public
/// function; it is an internal control value the cache and chain resolver
/// use between themselves.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Status {
    NotFound,
    CorruptDelta,
    CorruptBlob,
    CorruptCard,
    Io,
    Storage,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::NotFound => "not found",
            Status::CorruptDelta => "corrupt delta",
            Status::CorruptBlob => "corrupt blob",
            Status::CorruptCard => "corrupt card",
            Status::Io => "io error",
            Status::Storage => "storage error",
        };
        write!(f, "{}", s)
    }
}

/// The error type surfaced by every public operation in this crate.
pub struct RepoError {
    status: Status,
    description: Option<String>,
    cause: Option<Box<dyn StdError + Send + Sync>>,
}

impl RepoError {
    pub fn new(status: Status, description: Option<&str>) -> Self {
        Self {
            status,
            description: description.map(String::from),
            cause: None,
        }
    }

    pub fn with_cause(
        status: Status,
        description: impl Into<String>,
        cause: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            status,
            description: Some(description.into()),
            cause: Some(Box::new(cause)),
        }
    }

    #[inline]
    pub fn status(&self) -> Status {
        self.status
    }

    #[inline]
    pub fn description(&self) -> &str {
        self.description.as_deref().unwrap_or("")
    }

    #[inline]
    pub fn is_not_found(&self) -> bool {
        self.status == Status::NotFound
    }
}

impl fmt::Debug for RepoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepoError")
            .field("status", &self.status)
            .field("description", &self.description)
            .finish()
    }
}

impl fmt::Display for RepoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(d) if !d.is_empty() => write!(f, "{}: {}", self.status, d),
            _ => write!(f, "{}", self.status),
        }
    }
}

impl StdError for RepoError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause
            .as_ref()
            .map(|c| c.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<std::io::Error> for RepoError {
    fn from(e: std::io::Error) -> Self {
        RepoError::with_cause(Status::Io, "i/o error opening repository", e)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(e: rusqlite::Error) -> Self {
        if matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            RepoError::with_cause(Status::NotFound, "query returned no rows", e)
        } else {
            RepoError::with_cause(Status::Storage, "storage backend error", e)
        }
    }
}

pub type Result<T> = std::result::Result<T, RepoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_description() {
        let e = RepoError::new(Status::NotFound, Some("rid 42"));
        assert_eq!(e.to_string(), "not found: rid 42");
    }

    #[test]
    fn display_without_description() {
        let e = RepoError::new(Status::CorruptDelta, None);
        assert_eq!(e.to_string(), "corrupt delta");
    }

    #[test]
    fn is_not_found_helper() {
        let e = RepoError::new(Status::NotFound, None);
        assert!(e.is_not_found());
        let e2 = RepoError::new(Status::CorruptBlob, None);
        assert!(!e2.is_not_found());
    }
}
