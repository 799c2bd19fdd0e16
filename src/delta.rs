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

//! Applies the repository's binary delta instruction stream against a
//! source blob.
//!
//! ## Delta stream layout
//!
//! ```text
//!     <target-size:varint> '\n' { <n:varint> <op:byte> ... } <sum:varint> ';'
//! ```
//!
//! Each instruction is one of:
//!
//! ```text
//!     '@' COPY    <offset:varint> ','      append source[offset..offset+n]
//!     ':' INSERT  <n raw bytes>            append the next n delta bytes
//!     ';' END     (n is the declared checksum; stream ends here)
//! ```
//!
//! Any other op byte, or reaching end-of-delta without an END, is a fatal
//! `CorruptDelta` error.

use crate::checksum;
use crate::error::{RepoError, Result, Status};
use crate::varint;

const OP_COPY: u8 = b'@';
const OP_INSERT: u8 = b':';
const OP_END: u8 = b';';

fn corrupt(msg: impl Into<String>) -> RepoError {
    RepoError::new(Status::CorruptDelta, Some(&msg.into()))
}

/// Applies `delta` against `source`, returning the reconstructed target
/// buffer. If `verify` is set, also recomputes the checksum over the
/// produced buffer and fails if it disagrees with the delta's declared
/// checksum.
pub fn apply(source: &[u8], delta: &[u8], verify: bool) -> Result<Vec<u8>> {
    let (target_size, mut pos) = varint::decode(delta, 0);
    if pos >= delta.len() || delta[pos] != b'\n' {
        return Err(corrupt("missing newline after target size"));
    }
    pos += 1;

    let mut out = Vec::with_capacity(target_size as usize);

    loop {
        if pos >= delta.len() {
            return Err(corrupt("truncated delta: missing END instruction"));
        }
        let (n, next) = varint::decode(delta, pos);
        pos = next;
        if pos >= delta.len() {
            return Err(corrupt("truncated delta: missing op byte"));
        }
        let op = delta[pos];
        pos += 1;
        match op {
            OP_COPY => {
                let (offset, next) = varint::decode(delta, pos);
                pos = next;
                if pos >= delta.len() || delta[pos] != b',' {
                    return Err(corrupt("malformed COPY instruction"));
                }
                pos += 1;
                let offset = offset as usize;
                let n = n as usize;
                let end = offset
                    .checked_add(n)
                    .ok_or_else(|| corrupt("COPY offset+size overflow"))?;
                if end > source.len() {
                    return Err(corrupt(format!(
                        "COPY out of range: offset {offset} size {n} source len {}",
                        source.len()
                    )));
                }
                out.extend_from_slice(&source[offset..end]);
            }
            OP_INSERT => {
                let n = n as usize;
                let end = pos
                    .checked_add(n)
                    .ok_or_else(|| corrupt("INSERT size overflow"))?;
                if end > delta.len() {
                    return Err(corrupt("INSERT runs past end of delta"));
                }
                out.extend_from_slice(&delta[pos..end]);
                pos = end;
            }
            OP_END => {
                let declared_sum = n;
                let produced = out.len() as u64;
                if produced != target_size {
                    return Err(corrupt(format!(
                        "delta decoding failed, size mismatch: declared {target_size}, produced {produced}"
                    )));
                }
                if verify {
                    let actual = checksum::checksum(&out) as u64;
                    if actual != declared_sum {
                        return Err(corrupt(format!(
                            "delta decoding failed, checksum mismatch: declared {declared_sum:#x}, actual {actual:#x}"
                        )));
                    }
                }
                return Ok(out);
            }
            other => {
                return Err(corrupt(format!("invalid delta op byte {other:#x}")));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_and_insert_from_spec() {
        let source = b"Hello, World!";
        let d_digits = varint::encode(13);
        let mut delta = Vec::new();
        delta.extend_from_slice(&d_digits);
        delta.push(b'\n');
        delta.extend_from_slice(&d_digits);
        delta.push(OP_COPY);
        delta.extend_from_slice(b"0,");
        delta.push(b'0');
        delta.push(OP_END);
        let out = apply(source, &delta, false).unwrap();
        assert_eq!(out, source);
    }

    #[test]
    fn verify_fail_on_altered_checksum() {
        let source = b"Hello, World!";
        let d_digits = varint::encode(13);
        let mut delta = Vec::new();
        delta.extend_from_slice(&d_digits);
        delta.push(b'\n');
        delta.extend_from_slice(&d_digits);
        delta.push(OP_COPY);
        delta.extend_from_slice(b"0,");
        delta.extend_from_slice(&varint::encode(999_999));
        delta.push(OP_END);
        let err = apply(source, &delta, true).unwrap_err();
        assert_eq!(err.status(), Status::CorruptDelta);
    }

    #[test]
    fn identity_delta_property() {
        let source = b"arbitrary source content, any bytes at all \x00\xff";
        let sum = checksum::checksum(source);
        let delta = format!(
            "{}\n{}@0,{};",
            String::from_utf8(varint::encode(source.len() as u64)).unwrap(),
            String::from_utf8(varint::encode(source.len() as u64)).unwrap(),
            String::from_utf8(varint::encode(sum as u64)).unwrap(),
        );
        let out = apply(source, delta.as_bytes(), true).unwrap();
        assert_eq!(out, source);
    }

    #[test]
    fn unknown_op_byte_is_fatal() {
        let delta = b"0\n0#;";
        let err = apply(b"", delta, false).unwrap_err();
        assert_eq!(err.status(), Status::CorruptDelta);
    }

    #[test]
    fn missing_end_is_fatal() {
        let delta = b"0\n0:";
        let err = apply(b"", delta, false).unwrap_err();
        assert_eq!(err.status(), Status::CorruptDelta);
    }

    #[test]
    fn copy_out_of_range_is_fatal() {
        let source = b"short";
        let delta = b"10\n10@0,0;";
        let err = apply(source, delta, false).unwrap_err();
        assert_eq!(err.status(), Status::CorruptDelta);
    }

    #[test]
    fn size_mismatch_is_fatal_even_without_verify() {
        let source = b"Hello, World!";
        let delta = b"5\n5@0,0;";
        let err = apply(source, delta, false).unwrap_err();
        assert_eq!(err.status(), Status::CorruptDelta);
    }

    #[test]
    fn insert_then_copy_combo() {
        let source = b"0123456789";
        // target: "AB" + source[2..5] + "CD" = "AB234CD"
        let mut delta = Vec::new();
        delta.extend_from_slice(&varint::encode(7));
        delta.push(b'\n');
        delta.extend_from_slice(&varint::encode(2));
        delta.push(OP_INSERT);
        delta.extend_from_slice(b"AB");
        delta.extend_from_slice(&varint::encode(3));
        delta.push(OP_COPY);
        delta.extend_from_slice(&varint::encode(2));
        delta.push(b',');
        delta.extend_from_slice(&varint::encode(2));
        delta.push(OP_INSERT);
        delta.extend_from_slice(b"CD");
        delta.extend_from_slice(&varint::encode(0));
        delta.push(OP_END);
        let out = apply(source, &delta, false).unwrap();
        assert_eq!(out, b"AB234CD");
    }
}
