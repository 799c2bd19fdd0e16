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

//! The repository's base-64 variable-length integer encoding.
//!
//! Each digit packs 6 bits, most-significant digit first, using the
//! alphabet `0-9 A-Z _ a-z ~`:
//!
//! ```text
//!   value:  0 1 2 ... 9 10 11 ... 35 36 37 ... 62 63
//!   digit:  0 1 2 ... 9  A  B ...  Z  _  a ...  z  ~
//! ```
//!
//! Decoding stops at the first byte outside that alphabet (or end of
//! buffer) without consuming it; a run of zero digits decodes to `0` with
//! no offset advance, which is how callers tell "value 0" apart from
//! "nothing here to decode".

const ZDIGITS: &[u8; 64] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz~";

// Reverse lookup table: ZVALUE[byte as usize] is the 6-bit digit value for
// `byte`, or -1 if `byte` is not part of the alphabet. Built at compile
// time from ZDIGITS rather than transcribed by hand (hand transcription
// util module would likely hand-write this as a const array; doing it
// with a const fn avoids a transcription mismatch with ZDIGITS).
const ZVALUE: [i8; 256] = build_zvalue();

const fn build_zvalue() -> [i8; 256] {
    let mut table = [-1i8; 256];
    let mut i = 0;
    while i < ZDIGITS.len() {
        table[ZDIGITS[i] as usize] = i as i8;
        i += 1;
    }
    table
}

/// Decodes a varint starting at `buf[pos..]`.
///
/// Returns `(value, next_offset)` where `next_offset` is the absolute
/// offset into `buf` just past the last consumed digit. If `buf[pos]` is
/// not a digit (or `pos >= buf.len()`), returns `(0, pos)`.
pub fn decode(buf: &[u8], pos: usize) -> (u64, usize) {
    let mut v: u64 = 0;
    let mut i = pos;
    while i < buf.len() {
        let digit = ZVALUE[buf[i] as usize];
        if digit < 0 {
            break;
        }
        v = (v << 6) + digit as u64;
        i += 1;
    }
    (v, i)
}

/// Encodes `v` using the repository's base-64 digit alphabet, most
/// significant digit first. `encode(0)` is the single byte `'0'`.
///
/// Encoding is not exercised by the reconstruction pipeline (the core only
/// ever decodes delta streams produced elsewhere) but is kept for the
/// round-trip property exercised by the tests below.
pub fn encode(v: u64) -> Vec<u8> {
    if v == 0 {
        return vec![ZDIGITS[0]];
    }
    let mut digits = Vec::new();
    let mut v = v;
    while v > 0 {
        digits.push(ZDIGITS[(v & 0x3f) as usize]);
        v >>= 6;
    }
    digits.reverse();
    digits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_scenarios_from_spec() {
        assert_eq!(decode(b"~", 0), (63, 1));
        assert_eq!(decode(b"10", 0), (64, 2));
        assert_eq!(decode(b"", 0), (0, 0));
    }

    #[test]
    fn zero_digits_do_not_advance() {
        assert_eq!(decode(b",rest", 0), (0, 0));
    }

    #[test]
    fn stops_before_terminator() {
        let (v, pos) = decode(b"1A,", 0);
        assert_eq!(v, 1 * 64 + 10);
        assert_eq!(pos, 2);
    }

    #[test]
    fn round_trip_for_a_spread_of_values() {
        for v in [0u64, 1, 9, 10, 35, 36, 37, 62, 63, 64, 4095, 1_000_000, u32::MAX as u64] {
            let enc = encode(v);
            let (decoded, consumed) = decode(&enc, 0);
            assert_eq!(decoded, v, "value {v} round-trips");
            assert_eq!(consumed, enc.len());
        }
    }

    #[test]
    fn decode_stops_at_non_alphabet_terminator() {
        for &ch in b" \n,;@:" {
            let enc = encode(12345);
            let mut buf = enc.clone();
            buf.push(ch);
            let (v, pos) = decode(&buf, 0);
            assert_eq!(v, 12345);
            assert_eq!(pos, enc.len());
        }
    }

    #[test]
    fn decode_from_nonzero_offset() {
        let mut buf = b"prefix-".to_vec();
        buf.extend_from_slice(&encode(42));
        let (v, pos) = decode(&buf, 7);
        assert_eq!(v, 42);
        assert_eq!(pos, 7 + encode(42).len());
    }
}
