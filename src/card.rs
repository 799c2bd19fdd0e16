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

//! Parses a structural artifact's card grammar: a line-oriented format
//! where the first space-separated token on a line is a single uppercase
//! letter naming the card, and the rest of the line is card-specific.
//!
//! A blob is clear-sign-stripped first (see [`crate::clearsign`]), then
//! consumed line by line. Cards of type `F J M Q T` may repeat and
//! accumulate in file order; every other card overwrites on repeat.

use std::collections::HashMap;

use chrono::NaiveDateTime;

use crate::clearsign;
use crate::error::{RepoError, Result, Status};

/// The set of card types that may appear more than once per artifact.
const MULTI_CARDS: &[u8] = b"FJMQT";

/// `(letter, long name)` bimap, in the order the format's own
/// documentation lists them.
const CARD_NAMES: &[(u8, &str)] = &[
    (b'A', "attachment"),
    (b'B', "baseline"),
    (b'C', "comment"),
    (b'D', "datetime"),
    (b'E', "technote"),
    (b'F', "file"),
    (b'G', "thread_root"),
    (b'H', "thread_title"),
    (b'I', "in_reply_to"),
    (b'J', "ticket_change"),
    (b'K', "ticket_id"),
    (b'L', "wiki_title"),
    (b'M', "manifest"),
    (b'N', "mimetype"),
    (b'P', "parent_artifact"),
    (b'Q', "cherry_pick"),
    (b'R', "repository_checksum"),
    (b'T', "tag"),
    (b'U', "user_login"),
    (b'W', "wiki_text"),
    (b'Z', "checksum"),
];

fn long_name_to_letter(name: &str) -> Option<u8> {
    CARD_NAMES
        .iter()
        .find(|(_, n)| n.eq_ignore_ascii_case(name))
        .map(|(c, _)| *c)
}

/// One parsed card occurrence.
#[derive(Clone, Debug, PartialEq)]
pub enum CardValue {
    /// `A F J T`: a tuple of unescaped text tokens.
    TextTokens(Vec<String>),
    /// `B G I K N R Z`, and each `M` occurrence: a single raw token.
    Token(String),
    /// `C H L U`: unescaped free text (the whole remainder of the line).
    Text(String),
    /// `D`: seconds since the Unix epoch.
    DateTime(i64),
    /// `E`: datetime plus the remaining raw tokens.
    Technote(i64, Vec<String>),
    /// `P`, and each `Q` occurrence: a tuple of raw (non-unescaped) tokens.
    Tokens(Vec<String>),
    /// `W`: a length-prefixed UTF-8 text block.
    WikiText(String),
}

/// A card occurrence, or an ordered sequence of occurrences for the
/// multi-valued card types.
#[derive(Clone, Debug, PartialEq)]
pub enum CardEntry {
    Single(CardValue),
    Multi(Vec<CardValue>),
}

impl CardEntry {
    /// The single value, if this entry is not a multi-card.
    pub fn single(&self) -> Option<&CardValue> {
        match self {
            CardEntry::Single(v) => Some(v),
            CardEntry::Multi(_) => None,
        }
    }

    /// The sequence of values, if this entry is a multi-card; a
    /// single-valued entry is presented as a one-element slice so callers
    /// don't need to branch just to iterate.
    pub fn as_slice(&self) -> &[CardValue] {
        match self {
            CardEntry::Single(v) => std::slice::from_ref(v),
            CardEntry::Multi(vs) => vs,
        }
    }
}

/// The parsed card grammar of a structural artifact.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CardMap {
    entries: HashMap<u8, CardEntry>,
}

impl CardMap {
    /// Parses `blob` (clear-sign envelope stripped first) into a `CardMap`.
    pub fn parse(blob: &[u8]) -> Result<Self> {
        let stripped = clearsign::strip(blob);
        let mut map = CardMap::default();
        let mut pos = 0usize;
        while pos < stripped.len() {
            let line_end = find_newline(&stripped, pos);
            let line = &stripped[pos..line_end];
            let mut next_pos = if line_end < stripped.len() {
                line_end + 1
            } else {
                line_end
            };
            let cmd = match line.first() {
                Some(&b) if b.is_ascii_uppercase() => b,
                _ => {
                    return Err(corrupt(format!(
                        "unrecognized card: {}",
                        String::from_utf8_lossy(line)
                    )));
                }
            };
            let line_str = std::str::from_utf8(line)
                .map_err(|e| RepoError::with_cause(Status::CorruptCard, "card line is not valid utf-8", e))?;
            let mut fields = line_str.split(' ');
            fields.next(); // the card letter itself
            let toks: Vec<&str> = fields.filter(|t| !t.is_empty()).collect();
            let rest = line_str
                .splitn(2, ' ')
                .nth(1)
                .unwrap_or("")
                .as_bytes();

            let value = match cmd {
                b'A' | b'F' | b'J' | b'T' => {
                    CardValue::TextTokens(toks.iter().map(|t| unescape(t)).collect())
                }
                b'B' | b'G' | b'I' | b'K' | b'M' | b'N' | b'R' | b'Z' => {
                    let tok = toks.first().ok_or_else(|| {
                        corrupt(format!("card {} is missing its token", cmd as char))
                    })?;
                    CardValue::Token(tok.to_string())
                }
                b'C' | b'H' | b'L' | b'U' => {
                    let text = std::str::from_utf8(rest).expect("rest is a slice of an already-validated str");
                    CardValue::Text(unescape(text))
                }
                b'D' => {
                    let tok = toks.first().ok_or_else(|| corrupt("D card is missing its timestamp"))?;
                    CardValue::DateTime(parse_datetime(tok)?)
                }
                b'E' => {
                    if toks.is_empty() {
                        return Err(corrupt("E card is missing its timestamp"));
                    }
                    let ts = parse_datetime(toks[0])?;
                    let rest_toks = toks[1..].iter().map(|t| t.to_string()).collect();
                    CardValue::Technote(ts, rest_toks)
                }
                b'P' | b'Q' => CardValue::Tokens(toks.iter().map(|t| t.to_string()).collect()),
                b'W' => {
                    let size: usize = toks
                        .first()
                        .and_then(|t| t.parse().ok())
                        .ok_or_else(|| corrupt("W card has a non-numeric size"))?;
                    let start = next_pos;
                    let end = start.checked_add(size + 1).ok_or_else(|| {
                        corrupt("W card size overflows while computing block end")
                    })?;
                    if end > stripped.len() {
                        return Err(corrupt("W card block runs past end of artifact"));
                    }
                    let text = std::str::from_utf8(&stripped[start..end]).map_err(|e| {
                        RepoError::with_cause(
                            Status::CorruptCard,
                            "W card block is not valid utf-8",
                            e,
                        )
                    })?;
                    next_pos = end;
                    CardValue::WikiText(text.to_string())
                }
                other => {
                    return Err(corrupt(format!("unrecognized card type '{}'", other as char)));
                }
            };

            if MULTI_CARDS.contains(&cmd) {
                map.entries
                    .entry(cmd)
                    .and_modify(|e| match e {
                        CardEntry::Multi(vs) => vs.push(value.clone()),
                        CardEntry::Single(_) => unreachable!("multi card stored as Single"),
                    })
                    .or_insert_with(|| CardEntry::Multi(vec![value]));
            } else {
                map.entries.insert(cmd, CardEntry::Single(value));
            }

            pos = next_pos;
        }
        Ok(map)
    }

    /// Looks up a card by its single-letter type (`"C"`) or its long name
    /// (`"comment"`), case-insensitively for the long name.
    pub fn get(&self, key: &str) -> Result<&CardEntry> {
        let letter = if key.len() == 1 && key.as_bytes()[0].is_ascii_uppercase() {
            key.as_bytes()[0]
        } else if let Some(l) = long_name_to_letter(key) {
            l
        } else {
            return Err(RepoError::new(
                Status::CorruptCard,
                Some(&format!("no such card: {key}")),
            ));
        };
        self.entries
            .get(&letter)
            .ok_or_else(|| RepoError::new(Status::CorruptCard, Some(&format!("no such card: {key}"))))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_ok()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn corrupt(msg: impl Into<String>) -> RepoError {
    RepoError::new(Status::CorruptCard, Some(&msg.into()))
}

fn find_newline(buf: &[u8], from: usize) -> usize {
    buf[from..]
        .iter()
        .position(|&b| b == b'\n')
        .map(|i| from + i)
        .unwrap_or(buf.len())
}

/// Un-escapes `\\` → `\`, `\s` → space, `\n` → newline in one left-to-right
/// pass (equivalent to applying `\s`/`\n` first and `\\` last).
fn unescape(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = String::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 1 < bytes.len() {
            match bytes[i + 1] {
                b's' => {
                    out.push(' ');
                    i += 2;
                }
                b'n' => {
                    out.push('\n');
                    i += 2;
                }
                b'\\' => {
                    out.push('\\');
                    i += 2;
                }
                _ => {
                    out.push(bytes[i] as char);
                    i += 1;
                }
            }
        } else {
            // push raw byte's UTF-8 sequence, not just the ASCII fast path,
            // by walking via char_indices instead when we hit a multibyte lead.
            let ch = s[i..].chars().next().unwrap();
            out.push(ch);
            i += ch.len_utf8();
        }
    }
    out
}

/// Parses `YYYY-MM-DDTHH:MM:SS[.fff][Z|+hh:mm]`, ignoring any fractional
/// seconds or zone suffix beyond the first 19 characters, as UTC.
fn parse_datetime(s: &str) -> Result<i64> {
    if s.len() < 19 {
        return Err(corrupt(format!("malformed datetime: {s}")));
    }
    let core = &s[..19];
    let naive = NaiveDateTime::parse_from_str(core, "%Y-%m-%dT%H:%M:%S")
        .map_err(|e| RepoError::with_cause(Status::CorruptCard, format!("malformed datetime: {s}"), e))?;
    Ok(naive.and_utc().timestamp())
}
