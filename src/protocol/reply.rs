//! Reply decoding, the row cursor, attribute lookup, in-memory sort, and the
//! reply pool.

use crate::error::DecodeError;
use crate::ids::{KeyId, NameId, NamespaceId, RowId, TableId, UserId};
use crate::protocol::command;
use crate::protocol::result_code::ResultCode;
use crate::protocol::risp::{self, ParseTable};
use crate::protocol::value::Value;

/// One `KEY_ID -> VALUE` pair attached to a row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub key_id: KeyId,
    pub value: Value,
}

impl Attribute {
    const KNOWN: [u8; 2] = [command::KEY_ID, command::VALUE];

    fn decode(tables: &mut CodecTables, payload: &[u8]) -> Result<Self, DecodeError> {
        tables.attribute.clear();
        if risp::process(&mut tables.attribute, payload, &Self::KNOWN) == 0 {
            return Err(DecodeError::Truncated("ATTRIBUTE"));
        }
        let key_id = tables
            .attribute
            .scalar_int(command::KEY_ID, "KEY_ID")?
            .ok_or(DecodeError::Truncated("ATTRIBUTE.KEY_ID"))?;
        let key_id = KeyId::try_from(key_id as i32)
            .map_err(|_| DecodeError::UnexpectedCommand(command::KEY_ID, "ATTRIBUTE"))?;
        let value_rec = tables
            .attribute
            .scalar(command::VALUE, "VALUE")?
            .ok_or(DecodeError::Truncated("ATTRIBUTE.VALUE"))?;
        let value = Value::deserialize(&value_rec.payload)?;
        Ok(Attribute { key_id, value })
    }
}

/// One row of a reply: its identity (`NAME_ID`/`ROW_ID`) plus its attributes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    pub name_id: Option<NameId>,
    pub row_id: Option<RowId>,
    pub count: Option<i64>,
    attributes: Vec<Attribute>,
}

const ROW_KNOWN: [u8; 4] = [
    command::NAME_ID,
    command::ROW_ID,
    command::COUNT,
    command::ATTRIBUTE,
];

impl Row {
    fn decode(tables: &mut CodecTables, payload: &[u8]) -> Result<Self, DecodeError> {
        tables.row.clear();
        if risp::process(&mut tables.row, payload, &ROW_KNOWN) == 0 {
            return Err(DecodeError::Truncated("ROW"));
        }
        let name_id = match tables.row.scalar_int(command::NAME_ID, "NAME_ID")? {
            Some(raw) => Some(
                NameId::try_from(raw as i32)
                    .map_err(|_| DecodeError::UnexpectedCommand(command::NAME_ID, "ROW"))?,
            ),
            None => None,
        };
        let row_id = match tables.row.scalar_int(command::ROW_ID, "ROW_ID")? {
            Some(raw) => Some(
                RowId::try_from(raw as i32)
                    .map_err(|_| DecodeError::UnexpectedCommand(command::ROW_ID, "ROW"))?,
            ),
            None => None,
        };
        let count = tables.row.scalar_int(command::COUNT, "COUNT")?;
        let attr_payloads: Vec<Vec<u8>> = tables
            .row
            .all(command::ATTRIBUTE)
            .iter()
            .map(|rec| rec.payload.clone())
            .collect();
        let attributes = attr_payloads
            .iter()
            .map(|payload| Attribute::decode(tables, payload))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Row {
            name_id,
            row_id,
            count,
            attributes,
        })
    }

    fn attribute(&self, key_id: KeyId) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.key_id == key_id)
    }

    /// Returns the integer attribute value for `key_id`, or `0` if the
    /// attribute is absent or holds a different type (spec.md's
    /// zero-value-on-type-mismatch rule — callers never see an error from a
    /// simple scalar lookup).
    pub fn get_int(&self, key_id: KeyId) -> i32 {
        match self.attribute(key_id).map(|a| &a.value) {
            Some(Value::Int(i)) => *i,
            _ => 0,
        }
    }

    /// Returns the string/blob attribute value for `key_id`, or an empty
    /// slice if absent or holding a different type.
    pub fn get_str(&self, key_id: KeyId) -> &[u8] {
        match self.attribute(key_id).map(|a| &a.value) {
            Some(Value::Str(bytes)) => bytes,
            _ => &[],
        }
    }

    /// Byte length of the string/blob attribute value for `key_id`, or `0`.
    pub fn get_length(&self, key_id: KeyId) -> usize {
        self.get_str(key_id).len()
    }

    /// Raw typed value for `key_id`, if the attribute is present at all.
    pub fn get_value(&self, key_id: KeyId) -> Option<&Value> {
        self.attribute(key_id).map(|a| &a.value)
    }
}

/// A decoded `REPLY{...}`, or a synthesized stand-in for a `FAILED{...}`
/// (or a dispatcher-level transport failure): `result_code` always carries
/// the outcome, per spec.md §7 — a server-reported failure is data, not a
/// Rust `Err`. On anything but `ResultCode::Ok`, every field below
/// `result_code` is unspecified (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub result_code: ResultCode,
    pub request_id: i32,
    pub user_id: Option<UserId>,
    pub namespace_id: Option<NamespaceId>,
    pub table_id: Option<TableId>,
    pub key_id: Option<KeyId>,
    pub count: Option<i64>,
    pub rows: Vec<Row>,
    /// Cursor: `-1` before the first call to [`Reply::next_row`], `1..=rows.len()`
    /// while positioned on a row, `rows.len() + 1` once exhausted.
    current_row_index: i64,
}

const TOP_KNOWN: [u8; 2] = [command::REPLY, command::FAILED];

const REPLY_KNOWN: [u8; 7] = [
    command::REQUEST_ID,
    command::USER_ID,
    command::NAMESPACE_ID,
    command::TABLE_ID,
    command::KEY_ID,
    command::COUNT,
    command::ROW,
];

impl Reply {
    /// Builds the reply representing a server-reported `FAILED{code}` (or a
    /// dispatcher-synthesized transport failure): `result_code` carries the
    /// outcome, nothing else is populated.
    pub(crate) fn failed(code: ResultCode) -> Self {
        Reply {
            result_code: code,
            request_id: 0,
            user_id: None,
            namespace_id: None,
            table_id: None,
            key_id: None,
            count: None,
            rows: Vec::new(),
            current_row_index: -1,
        }
    }

    /// Decodes a top-level `REPLY{...}` or `FAILED{...}` record, whichever
    /// the server sent. Reuses `tables`' five per-session parse tables
    /// rather than allocating fresh ones (spec.md §4.1).
    pub(crate) fn decode_response(
        tables: &mut CodecTables,
        bytes: &[u8],
    ) -> Result<Self, DecodeError> {
        tables.top.clear();
        if risp::process(&mut tables.top, bytes, &TOP_KNOWN) == 0 {
            return Err(DecodeError::Truncated("RESPONSE"));
        }
        let reply_payload = tables
            .top
            .scalar(command::REPLY, "REPLY")?
            .map(|rec| rec.payload.clone());
        if let Some(payload) = reply_payload {
            return Reply::decode(tables, &payload);
        }
        let failed_payload = tables
            .top
            .scalar(command::FAILED, "FAILED")?
            .map(|rec| rec.payload.clone());
        if let Some(payload) = failed_payload {
            tables.failed.clear();
            risp::process(&mut tables.failed, &payload, &[command::FAILCODE]);
            let code = tables
                .failed
                .scalar_int(command::FAILCODE, "FAILCODE")?
                .ok_or(DecodeError::Truncated("FAILED.FAILCODE"))?;
            return Ok(Reply::failed(ResultCode::from(code as u32)));
        }
        Err(DecodeError::Truncated("RESPONSE"))
    }

    fn decode(tables: &mut CodecTables, payload: &[u8]) -> Result<Self, DecodeError> {
        tables.reply.clear();
        if risp::process(&mut tables.reply, payload, &REPLY_KNOWN) == 0 {
            return Err(DecodeError::Truncated("REPLY"));
        }
        let request_id = tables
            .reply
            .scalar_int(command::REQUEST_ID, "REQUEST_ID")?
            .ok_or(DecodeError::Truncated("REPLY.REQUEST_ID"))? as i32;
        let user_id = opt_id(&tables.reply, command::USER_ID, "USER_ID", UserId::try_from)?;
        let namespace_id = opt_id(
            &tables.reply,
            command::NAMESPACE_ID,
            "NAMESPACE_ID",
            NamespaceId::try_from,
        )?;
        let table_id = opt_id(
            &tables.reply,
            command::TABLE_ID,
            "TABLE_ID",
            TableId::try_from,
        )?;
        let key_id = opt_id(&tables.reply, command::KEY_ID, "KEY_ID", KeyId::try_from)?;
        let count = tables.reply.scalar_int(command::COUNT, "COUNT")?;
        let row_payloads: Vec<Vec<u8>> = tables
            .reply
            .all(command::ROW)
            .iter()
            .map(|rec| rec.payload.clone())
            .collect();
        let rows = row_payloads
            .iter()
            .map(|payload| Row::decode(tables, payload))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Reply {
            result_code: ResultCode::Ok,
            request_id,
            user_id,
            namespace_id,
            table_id,
            key_id,
            count,
            rows,
            current_row_index: -1,
        })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Advances the cursor and returns the row it now points to, or `None`
    /// once every row has been visited. Calling again after exhaustion keeps
    /// returning `None` without rewinding.
    pub fn next_row(&mut self) -> Option<&Row> {
        let row_count = self.rows.len() as i64;
        if self.current_row_index == -1 {
            self.current_row_index = 1;
        } else if self.current_row_index <= row_count {
            self.current_row_index += 1;
        }
        if self.current_row_index >= 1 && self.current_row_index <= row_count {
            Some(&self.rows[(self.current_row_index - 1) as usize])
        } else {
            None
        }
    }

    /// Resets the cursor so the next [`Reply::next_row`] starts from the
    /// first row again.
    pub fn rewind(&mut self) {
        self.current_row_index = -1;
    }

    /// Stably sorts rows by their `key_id` attribute value. Rows missing the
    /// key sort after rows that have it, each group keeping its relative
    /// order. Comparing an `Int` attribute against a `Str` attribute across
    /// rows is an error; within a shared type, strings compare byte-wise up
    /// to the shorter length, with the shorter string sorting first on a tie
    /// (the original library's `strncmp`-style comparison). Resets the
    /// cursor.
    pub fn sort_by_key(&mut self, key_id: KeyId) -> Result<(), DecodeError> {
        let mut present_type: Option<std::mem::Discriminant<Value>> = None;
        for row in &self.rows {
            if let Some(v) = row.get_value(key_id) {
                let disc = std::mem::discriminant(v);
                match present_type {
                    None => present_type = Some(disc),
                    Some(prev) if prev != disc => return Err(DecodeError::MixedSortTypes),
                    _ => {}
                }
            }
        }

        let mut with_key: Vec<Row> = Vec::new();
        let mut without_key: Vec<Row> = Vec::new();
        for row in self.rows.drain(..) {
            if row.attribute(key_id).is_some() {
                with_key.push(row);
            } else {
                without_key.push(row);
            }
        }

        with_key.sort_by(|a, b| compare_values(a.get_value(key_id), b.get_value(key_id)));

        with_key.extend(without_key);
        self.rows = with_key;
        self.current_row_index = -1;
        Ok(())
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    match (a, b) {
        (Some(Value::Int(x)), Some(Value::Int(y))) => x.cmp(y),
        (Some(Value::Str(x)), Some(Value::Str(y))) => {
            let n = x.len().min(y.len());
            x[..n].cmp(&y[..n]).then_with(|| x.len().cmp(&y.len()))
        }
        // Reached only when both rows lack the key, or hold incomparable
        // shapes that sort_by_key's pre-scan already rejected.
        _ => std::cmp::Ordering::Equal,
    }
}

fn opt_id<T>(
    table: &ParseTable,
    cmd: u8,
    name: &'static str,
    make: impl Fn(i32) -> Result<T, crate::error::StashError>,
) -> Result<Option<T>, DecodeError> {
    match table.scalar_int(cmd, name)? {
        None => Ok(None),
        Some(raw) => make(raw as i32)
            .map(Some)
            .map_err(|_| DecodeError::UnexpectedCommand(cmd, name)),
    }
}

/// The session's five persistent parse-dispatch tables (spec.md §4.1):
/// top-level response, `REPLY`, `FAILED`, `ROW`, and `ATTRIBUTE`. Built once
/// (one per [`crate::Session`]/[`crate::conn::dispatch::Dispatcher`]) and
/// reset — not reallocated — before each decode, rather than a fresh
/// [`ParseTable`] per nesting level on every call.
#[derive(Debug, Default)]
pub(crate) struct CodecTables {
    top: ParseTable,
    reply: ParseTable,
    failed: ParseTable,
    row: ParseTable,
    attribute: ParseTable,
}

impl CodecTables {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Command ids seen across all five tables that weren't in their known
    /// set, oldest first (spec.md §4.1's diagnostics ring).
    pub(crate) fn unexpected_commands(&self) -> impl Iterator<Item = u8> + '_ {
        self.top
            .unexpected_commands()
            .chain(self.reply.unexpected_commands())
            .chain(self.failed.unexpected_commands())
            .chain(self.row.unexpected_commands())
            .chain(self.attribute.unexpected_commands())
    }
}

/// A free-list of reusable [`Reply`] slots. `None` marks a free slot — the
/// idiomatic stand-in for the original library's `in_use`/`operation == 0`
/// bookkeeping (see DESIGN.md). Wired up as [`crate::Session::return_reply`].
#[derive(Debug, Default)]
pub struct ReplyPool {
    slots: Vec<Option<Reply>>,
}

impl ReplyPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `reply` into the first free slot (or a new one), returning
    /// its handle.
    pub fn insert(&mut self, reply: Reply) -> usize {
        if let Some(idx) = self.slots.iter().position(Option::is_none) {
            self.slots[idx] = Some(reply);
            idx
        } else {
            self.slots.push(Some(reply));
            self.slots.len() - 1
        }
    }

    pub fn get(&self, handle: usize) -> Option<&Reply> {
        self.slots.get(handle).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, handle: usize) -> Option<&mut Reply> {
        self.slots.get_mut(handle).and_then(Option::as_mut)
    }

    /// Frees the slot so a future [`ReplyPool::insert`] can reuse it.
    pub fn release(&mut self, handle: usize) {
        if let Some(slot) = self.slots.get_mut(handle) {
            *slot = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::command;
    use crate::protocol::risp;

    fn encode_row(name_id: u32, row_id: u32, attrs: &[(u32, Value)]) -> Vec<u8> {
        let mut row = Vec::new();
        risp::encode_int(&mut row, command::NAME_ID, name_id as i32).unwrap();
        risp::encode_int(&mut row, command::ROW_ID, row_id as i32).unwrap();
        for (key_id, value) in attrs {
            let mut attr = Vec::new();
            risp::encode_int(&mut attr, command::KEY_ID, *key_id as i32).unwrap();
            let mut value_buf = Vec::new();
            value.serialize(&mut value_buf).unwrap();
            attr.extend_from_slice(&value_buf);
            risp::encode_record(&mut row, command::ATTRIBUTE, &attr).unwrap();
        }
        let mut out = Vec::new();
        risp::encode_record(&mut out, command::ROW, &row).unwrap();
        out
    }

    fn sample_reply(rows: &[Vec<u8>]) -> Vec<u8> {
        let mut payload = Vec::new();
        risp::encode_int(&mut payload, command::REQUEST_ID, 1).unwrap();
        for row in rows {
            payload.extend_from_slice(row);
        }
        let mut out = Vec::new();
        risp::encode_record(&mut out, command::REPLY, &payload).unwrap();
        out
    }

    fn decode(bytes: &[u8]) -> Reply {
        let mut tables = CodecTables::new();
        Reply::decode_response(&mut tables, bytes).unwrap()
    }

    #[test]
    fn next_row_walks_then_exhausts() {
        let rows = vec![
            encode_row(1, 1, &[(5, Value::Int(10))]),
            encode_row(2, 2, &[(5, Value::Int(20))]),
        ];
        let mut reply = decode(&sample_reply(&rows));
        assert_eq!(reply.next_row().unwrap().get_int(KeyId::new(5).unwrap()), 10);
        assert_eq!(reply.next_row().unwrap().get_int(KeyId::new(5).unwrap()), 20);
        assert!(reply.next_row().is_none());
        assert!(reply.next_row().is_none());
    }

    #[test]
    fn missing_attribute_returns_zero_value() {
        let rows = vec![encode_row(1, 1, &[])];
        let mut reply = decode(&sample_reply(&rows));
        let row = reply.next_row().unwrap();
        assert_eq!(row.get_int(KeyId::new(9).unwrap()), 0);
        assert_eq!(row.get_str(KeyId::new(9).unwrap()), b"");
    }

    #[test]
    fn sort_groups_missing_key_after_present_and_is_stable() {
        let rows = vec![
            encode_row(1, 1, &[(5, Value::Int(3))]),
            encode_row(2, 2, &[]),
            encode_row(3, 3, &[(5, Value::Int(1))]),
            encode_row(4, 4, &[]),
        ];
        let mut reply = decode(&sample_reply(&rows));
        reply.sort_by_key(KeyId::new(5).unwrap()).unwrap();
        let order: Vec<u32> = reply
            .rows
            .iter()
            .map(|r| r.row_id.unwrap().get())
            .collect();
        assert_eq!(order, vec![3, 1, 2, 4]);
    }

    #[test]
    fn sort_rejects_mixed_types() {
        let rows = vec![
            encode_row(1, 1, &[(5, Value::Int(1))]),
            encode_row(2, 2, &[(5, Value::str("x"))]),
        ];
        let mut reply = decode(&sample_reply(&rows));
        assert_eq!(
            reply.sort_by_key(KeyId::new(5).unwrap()).unwrap_err(),
            DecodeError::MixedSortTypes
        );
    }

    #[test]
    fn failed_reply_carries_result_code() {
        let mut payload = Vec::new();
        risp::encode_int(&mut payload, command::FAILCODE, 3).unwrap();
        let mut bytes = Vec::new();
        risp::encode_record(&mut bytes, command::FAILED, &payload).unwrap();
        let reply = decode(&bytes);
        assert_eq!(reply.result_code, ResultCode::AuthFailed);
        assert!(reply.rows.is_empty());
    }

    #[test]
    fn codec_tables_are_reused_across_decodes() {
        let mut tables = CodecTables::new();
        let first = Reply::decode_response(&mut tables, &sample_reply(&[])).unwrap();
        assert_eq!(first.request_id, 1);
        let second = Reply::decode_response(&mut tables, &sample_reply(&[])).unwrap();
        assert_eq!(second.request_id, 1);
    }

    #[test]
    fn reply_pool_reuses_released_slots() {
        let mut pool = ReplyPool::new();
        let reply = decode(&sample_reply(&[]));
        let handle = pool.insert(reply.clone());
        pool.release(handle);
        let handle2 = pool.insert(reply);
        assert_eq!(handle, handle2);
    }
}
