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

//! The delta stream's rolling checksum: a sum of big-endian `u32` words
//! over the buffer, wrapping at 2^32, with the tail zero-padded up to the
//! next multiple of 4 before summation.
//!
//! There is only one implementation here — no SIMD/vectorized fast path.
//! Some implementations offer an optional vector-library path for this sum;
//! a scalar loop over `u32` chunks is already fast enough in a systems
//! language, so there's nothing to make optional.

/// Computes the checksum of `buf`.
pub fn checksum(buf: &[u8]) -> u32 {
    let mut sum: u32 = 0;
    let mut chunks = buf.chunks_exact(4);
    for chunk in &mut chunks {
        let word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        sum = sum.wrapping_add(word);
    }
    let rem = chunks.remainder();
    if !rem.is_empty() {
        let mut padded = [0u8; 4];
        padded[..rem.len()].copy_from_slice(rem);
        let word = u32::from_be_bytes(padded);
        sum = sum.wrapping_add(word);
    }
    sum
}
