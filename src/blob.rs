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

//! Inflates a stored blob.
//!
//! ```text
//!     u32 big-endian declared-original-size || deflate stream
//! ```
//!
//! The declared size is advisory by default (some repositories in the wild
//! omit it correctly); `decompress_checked` validates it and is used when
//! `OpenOptions::validate_blob_header` is enabled.

use std::io::Read;

use flate2::read::ZlibDecoder;

use crate::error::{RepoError, Result, Status};

/// Inflates `content`, ignoring the declared size prefix beyond skipping it.
pub fn decompress(content: &[u8]) -> Result<Vec<u8>> {
    decompress_inner(content, false)
}

/// Inflates `content` and fails with `CorruptBlob` if the declared
/// original size in the 4-byte header disagrees with the inflated length.
pub fn decompress_checked(content: &[u8]) -> Result<Vec<u8>> {
    decompress_inner(content, true)
}

fn decompress_inner(content: &[u8], check_size: bool) -> Result<Vec<u8>> {
    if content.len() < 4 {
        return Err(RepoError::new(
            Status::CorruptBlob,
            Some("blob shorter than the 4-byte size header"),
        ));
    }
    let declared_size = u32::from_be_bytes([content[0], content[1], content[2], content[3]]);
    let mut decoder = ZlibDecoder::new(&content[4..]);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| RepoError::with_cause(Status::CorruptBlob, "inflate failed", e))?;
    if check_size && out.len() as u64 != declared_size as u64 {
        return Err(RepoError::new(
            Status::CorruptBlob,
            Some(&format!(
                "declared size {declared_size} does not match inflated length {}",
                out.len()
            )),
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn compress(original: &[u8]) -> Vec<u8> {
        let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(original).unwrap();
        let deflated = encoder.finish().unwrap();
        let mut out = Vec::new();
        out.extend_from_slice(&(original.len() as u32).to_be_bytes());
        out.extend_from_slice(&deflated);
        out
    }

    #[test]
    fn round_trips_through_deflate() {
        let original = b"the quick brown fox jumps over the lazy dog, repeatedly ".repeat(4);
        let content = compress(&original);
        let out = decompress(&content).unwrap();
        assert_eq!(out, original);
    }

    #[test]
    fn size_is_advisory_by_default() {
        let original = b"hello world";
        let mut content = compress(original);
        // corrupt the declared size; unchecked decompress should not care
        content[0] = 0xFF;
        let out = decompress(&content).unwrap();
        assert_eq!(out, original);
    }

    #[test]
    fn checked_mode_rejects_size_mismatch() {
        let original = b"hello world";
        let mut content = compress(original);
        content[0] = 0xFF;
        let err = decompress_checked(&content).unwrap_err();
        assert_eq!(err.status(), Status::CorruptBlob);
    }

    #[test]
    fn rejects_truncated_header() {
        let err = decompress(&[0, 0]).unwrap_err();
        assert_eq!(err.status(), Status::CorruptBlob);
    }

    #[test]
    fn rejects_garbage_deflate_stream() {
        let mut content = vec![0, 0, 0, 3];
        content.extend_from_slice(b"not a deflate stream");
        let err = decompress(&content).unwrap_err();
        assert_eq!(err.status(), Status::CorruptBlob);
    }
}
