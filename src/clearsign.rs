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

//! Strips a PGP clear-sign envelope from a blob, if present.
//!
//! File blobs never start with the clear-sign header, so this is a no-op
//! for them; only some structural artifacts carry the wrapper.

const CLEARSIGN_HEADER: &[u8] = b"-----BEGIN PGP SIGNED MESSAGE-----";
const PGPSIGN_HEADER: &[u8] = b"-----BEGIN PGP SIGNATURE-----";

/// Returns `blob` unchanged if it does not start with the clear-sign
/// header; otherwise skips the armor header block (up to and including
/// the first blank line), un-dash-escapes the remaining lines, and drops
/// everything from the `-----BEGIN PGP SIGNATURE-----` line onward.
pub fn strip(blob: &[u8]) -> Vec<u8> {
    if !blob.starts_with(CLEARSIGN_HEADER) {
        return blob.to_vec();
    }

    let mut out = Vec::with_capacity(blob.len());
    let mut in_content = false;
    for line in split_lines_keep_ends(blob) {
        let trimmed_end = trim_trailing_newline(line);
        if !in_content {
            if trimmed_end.is_empty() {
                in_content = true;
            }
            continue;
        }
        if trimmed_end == PGPSIGN_HEADER {
            break;
        }
        if let Some(rest) = line.strip_prefix(b"- ") {
            out.extend_from_slice(rest);
        } else {
            out.extend_from_slice(line);
        }
    }
    out
}

/// Splits `buf` into lines, each including its trailing `\n` (or `\r\n`)
/// if present, mirroring Python's `bytes.splitlines(keepends=True)` for
/// the `\n`/`\r\n` cases this format actually uses.
fn split_lines_keep_ends(buf: &[u8]) -> Vec<&[u8]> {
    let mut lines = Vec::new();
    let mut start = 0;
    for i in 0..buf.len() {
        if buf[i] == b'\n' {
            lines.push(&buf[start..=i]);
            start = i + 1;
        }
    }
    if start < buf.len() {
        lines.push(&buf[start..]);
    }
    lines
}

fn trim_trailing_newline(line: &[u8]) -> &[u8] {
    let mut end = line.len();
    if end > 0 && line[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && line[end - 1] == b'\r' {
        end -= 1;
    }
    &line[..end]
}
