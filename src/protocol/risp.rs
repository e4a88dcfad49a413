//! RISP: the self-describing binary framing used for every request and
//! reply. A record is `{cmd_id, [length], [payload]}`; the high bits of
//! `cmd_id` select the payload shape (see [`super::command::WidthClass`]).
//!
//! This module has two halves: free functions that *append* one record to a
//! growable buffer (`encode_*`), and [`ParseTable`] /  [`process`] which
//! *decode* a byte slice into a command-id-indexed table of raw records.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use crate::error::{DecodeError, EncodeError};
use crate::protocol::command::WidthClass;
use std::collections::{HashMap, VecDeque};
use std::io::{Cursor, Read};

/// One decoded record: the command id and its raw payload bytes (empty for
/// markers and flags).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub cmd: u8,
    pub payload: Vec<u8>,
}

// ---------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------

fn check_len(cmd: u8, len: usize) -> Result<(), EncodeError> {
    let width = WidthClass::of(cmd);
    if matches!(
        width,
        WidthClass::ShortBytes | WidthClass::MidBytes | WidthClass::LongBytes
    ) && len > width.max_len()
    {
        Err(EncodeError::LengthOverflow { cmd, len })
    } else {
        Ok(())
    }
}

/// Appends a marker/flag record (no payload). Valid for command ids in the
/// 0-63 range.
pub fn encode_marker(buf: &mut Vec<u8>, cmd: u8) {
    buf.push(cmd);
}

/// Appends a record whose payload is an integer, choosing the width implied
/// by `cmd`'s range (1, 2, or 4 bytes, big-endian).
pub fn encode_int(buf: &mut Vec<u8>, cmd: u8, value: i32) -> Result<(), EncodeError> {
    // A Vec<u8> writer never actually fails; the `expect`s below just name
    // that invariant instead of threading a spurious io::Error upward.
    match WidthClass::of(cmd) {
        WidthClass::U8 => {
            buf.push(cmd);
            buf.write_u8(value as u8).expect("write to Vec<u8> cannot fail");
        }
        WidthClass::U16 => {
            buf.push(cmd);
            buf.write_u16::<BigEndian>(value as u16)
                .expect("write to Vec<u8> cannot fail");
        }
        WidthClass::U32 => {
            buf.push(cmd);
            buf.write_i32::<BigEndian>(value)
                .expect("write to Vec<u8> cannot fail");
        }
        _ => {
            return Err(EncodeError::LengthOverflow { cmd, len: 4 });
        }
    }
    Ok(())
}

/// Appends a length-prefixed bytes record, choosing the narrowest length
/// prefix implied by `cmd`'s range.
pub fn encode_bytes(buf: &mut Vec<u8>, cmd: u8, data: &[u8]) -> Result<(), EncodeError> {
    check_len(cmd, data.len())?;
    match WidthClass::of(cmd) {
        WidthClass::ShortBytes => {
            buf.push(cmd);
            buf.write_u8(data.len() as u8)
                .expect("write to Vec<u8> cannot fail");
        }
        WidthClass::MidBytes => {
            buf.push(cmd);
            buf.write_u16::<BigEndian>(data.len() as u16)
                .expect("write to Vec<u8> cannot fail");
        }
        WidthClass::LongBytes => {
            buf.push(cmd);
            buf.write_u32::<BigEndian>(data.len() as u32)
                .expect("write to Vec<u8> cannot fail");
        }
        _ => return Err(EncodeError::LengthOverflow { cmd, len: data.len() }),
    }
    buf.extend_from_slice(data);
    Ok(())
}

/// Appends a nested record whose payload is itself a sequence of already
/// encoded records. Equivalent to `encode_bytes`, kept as a distinct name
/// because every call site is building a `LongBytes`-class container.
pub fn encode_record(buf: &mut Vec<u8>, cmd: u8, inner: &[u8]) -> Result<(), EncodeError> {
    encode_bytes(buf, cmd, inner)
}

// ---------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------

/// Scans `bytes` left to right into complete records. Returns `None` if the
/// trailing record is truncated; a partial record never contributes to the
/// returned list.
fn scan(bytes: &[u8]) -> Option<Vec<RawRecord>> {
    let mut out = Vec::new();
    let mut cursor = Cursor::new(bytes);
    while (cursor.position() as usize) < bytes.len() {
        let cmd = cursor.read_u8().ok()?;
        let payload = match WidthClass::of(cmd) {
            WidthClass::Marker | WidthClass::Flag => Vec::new(),
            WidthClass::U8 => vec![cursor.read_u8().ok()?],
            WidthClass::U16 => cursor.read_u16::<BigEndian>().ok()?.to_be_bytes().to_vec(),
            WidthClass::U32 => cursor.read_u32::<BigEndian>().ok()?.to_be_bytes().to_vec(),
            WidthClass::ShortBytes => {
                let len = cursor.read_u8().ok()? as usize;
                read_exact_from(&mut cursor, len)?
            }
            WidthClass::MidBytes => {
                let len = cursor.read_u16::<BigEndian>().ok()? as usize;
                read_exact_from(&mut cursor, len)?
            }
            WidthClass::LongBytes => {
                let len = cursor.read_u32::<BigEndian>().ok()? as usize;
                read_exact_from(&mut cursor, len)?
            }
        };
        out.push(RawRecord { cmd, payload });
    }
    Some(out)
}

/// Reads exactly `len` payload bytes from `cursor`, or `None` if fewer than
/// `len` bytes remain (a truncated trailing record).
fn read_exact_from(cursor: &mut Cursor<&[u8]>, len: usize) -> Option<Vec<u8>> {
    let mut buf = vec![0u8; len];
    cursor.read_exact(&mut buf).ok()?;
    Some(buf)
}

/// A decode-time dispatch table: every command id seen while parsing a
/// buffer is recorded here, in the order it was seen. Multiple occurrences
/// of the same command id (e.g. repeated `ROW` records within a `REPLY`)
/// are all retained; scalar accessors reject more than one.
#[derive(Debug, Default)]
pub struct ParseTable {
    entries: HashMap<u8, Vec<RawRecord>>,
    unexpected: VecDeque<u8>,
}

const UNEXPECTED_RING_CAP: usize = 32;

impl ParseTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets this table to empty without giving back its `HashMap`'s
    /// allocated capacity, so a table reused across calls doesn't reallocate
    /// on every decode.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.unexpected.clear();
    }

    fn note(&mut self, cmd: u8, known: &[u8]) {
        if !known.contains(&cmd) {
            if self.unexpected.len() == UNEXPECTED_RING_CAP {
                self.unexpected.pop_front();
            }
            self.unexpected.push_back(cmd);
        }
    }

    /// Command ids seen that were not in the caller's known set, most recent
    /// last, capped at a small fixed size. Exposed for diagnostics.
    pub fn unexpected_commands(&self) -> impl Iterator<Item = u8> + '_ {
        self.unexpected.iter().copied()
    }

    pub fn is_set(&self, cmd: u8) -> bool {
        self.entries.contains_key(&cmd)
    }

    pub fn all(&self, cmd: u8) -> &[RawRecord] {
        self.entries.get(&cmd).map_or(&[], Vec::as_slice)
    }

    /// Returns the single record for `cmd`, erroring if it was set more than
    /// once.
    pub fn scalar(&self, cmd: u8, name: &'static str) -> Result<Option<&RawRecord>, DecodeError> {
        match self.entries.get(&cmd) {
            None => Ok(None),
            Some(v) if v.len() == 1 => Ok(Some(&v[0])),
            Some(_) => Err(DecodeError::DuplicateScalar(name)),
        }
    }

    /// Reads a scalar integer record, interpreting its payload per its
    /// width class (1, 2, or 4 bytes, big-endian).
    pub fn scalar_int(&self, cmd: u8, name: &'static str) -> Result<Option<i64>, DecodeError> {
        Ok(match self.scalar(cmd, name)? {
            None => None,
            Some(rec) => Some(match rec.payload.len() {
                1 => i64::from(rec.payload[0]),
                2 => i64::from(
                    (&rec.payload[..])
                        .read_u16::<BigEndian>()
                        .expect("length checked above"),
                ),
                4 => i64::from(
                    (&rec.payload[..])
                        .read_i32::<BigEndian>()
                        .expect("length checked above"),
                ),
                _ => return Err(DecodeError::UnexpectedCommand(cmd, name)),
            }),
        })
    }
}

/// Parses `bytes` into `table`, left to right. Returns `bytes.len()` if
/// every record was complete; returns `0` if the trailing record was
/// truncated, leaving `table` exactly as it was before the call (a partial
/// record never mutates state; the caller must retry with more bytes).
pub fn process(table: &mut ParseTable, bytes: &[u8], known: &[u8]) -> usize {
    match scan(bytes) {
        None => 0,
        Some(records) => {
            for rec in records {
                table.note(rec.cmd, known);
                table.entries.entry(rec.cmd).or_default().push(rec);
            }
            bytes.len()
        }
    }
}
