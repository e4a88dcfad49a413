//! The recursive query-condition tree and its bidirectional serialization.

use crate::error::{DecodeError, EncodeError};
use crate::ids::{KeyId, NameId};
use crate::protocol::command;
use crate::protocol::risp::{self, ParseTable};
use crate::protocol::value::Value;

/// Either a `NAME_ID` or a literal `NAME`, never both (spec.md's `Name`
/// condition has exactly one populated).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameRef {
    Id(NameId),
    Literal(String),
}

/// A boolean composition of predicates over attribute keys.
///
/// `And`/`Or` always own both children; `Not` owns exactly one. Children are
/// taken by value at construction time (`Box<Condition>`), so a subtree
/// cannot be aliased into two parents — the reimplementation's answer to
/// "Shared condition subtrees" in DESIGN.md: ownership, not shared pointers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Equals { key_id: KeyId, value: Value },
    /// Wire extension: emitted as its own `COND_GT` record (see
    /// [`command::COND_GT`] and DESIGN.md), not folded into `COND_EQUALS` as
    /// the original library's `build_condition` did.
    GreaterThan { key_id: KeyId, value: Value },
    Exists { key_id: KeyId },
    Name(NameRef),
    And(Box<Condition>, Box<Condition>),
    Or(Box<Condition>, Box<Condition>),
    Not(Box<Condition>),
}

impl Condition {
    pub fn equals(key_id: KeyId, value: Value) -> Self {
        Condition::Equals { key_id, value }
    }

    pub fn greater_than(key_id: KeyId, value: Value) -> Self {
        Condition::GreaterThan { key_id, value }
    }

    pub fn exists(key_id: KeyId) -> Self {
        Condition::Exists { key_id }
    }

    pub fn name_id(name_id: NameId) -> Self {
        Condition::Name(NameRef::Id(name_id))
    }

    pub fn name_literal(name: impl Into<String>) -> Self {
        Condition::Name(NameRef::Literal(name.into()))
    }

    pub fn and(self, other: Condition) -> Self {
        Condition::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Condition) -> Self {
        Condition::Or(Box::new(self), Box::new(other))
    }

    pub fn not(self) -> Self {
        Condition::Not(Box::new(self))
    }

    /// Emits one record whose command id selects the shape, recursing into
    /// child conditions.
    pub fn serialize(&self, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        let mut inner = Vec::new();
        match self {
            Condition::Equals { key_id, value } => {
                risp::encode_int(&mut inner, command::KEY_ID, key_id.get() as i32)?;
                let mut value_buf = Vec::new();
                value.serialize(&mut value_buf)?;
                inner.extend_from_slice(&value_buf);
                risp::encode_record(buf, command::COND_EQUALS, &inner)?;
            }
            Condition::GreaterThan { key_id, value } => {
                risp::encode_int(&mut inner, command::KEY_ID, key_id.get() as i32)?;
                let mut value_buf = Vec::new();
                value.serialize(&mut value_buf)?;
                inner.extend_from_slice(&value_buf);
                risp::encode_record(buf, command::COND_GT, &inner)?;
            }
            Condition::Exists { key_id } => {
                risp::encode_int(&mut inner, command::KEY_ID, key_id.get() as i32)?;
                risp::encode_record(buf, command::COND_EXISTS, &inner)?;
            }
            Condition::Name(name_ref) => {
                match name_ref {
                    NameRef::Id(id) => {
                        risp::encode_int(&mut inner, command::NAME_ID, id.get() as i32)?
                    }
                    NameRef::Literal(name) => {
                        risp::encode_bytes(&mut inner, command::NAME, name.as_bytes())?
                    }
                }
                risp::encode_record(buf, command::COND_NAME, &inner)?;
            }
            Condition::And(a, b) | Condition::Or(a, b) => {
                let mut a_buf = Vec::new();
                a.serialize(&mut a_buf)?;
                risp::encode_record(&mut inner, command::COND_A, &a_buf)?;

                let mut b_buf = Vec::new();
                b.serialize(&mut b_buf)?;
                risp::encode_record(&mut inner, command::COND_B, &b_buf)?;

                let outer_cmd = if matches!(self, Condition::And(..)) {
                    command::COND_AND
                } else {
                    command::COND_OR
                };
                risp::encode_record(buf, outer_cmd, &inner)?;
            }
            Condition::Not(a) => {
                a.serialize(&mut inner)?;
                risp::encode_record(buf, command::COND_NOT, &inner)?;
            }
        }
        Ok(())
    }

    const KNOWN: [u8; 9] = [
        command::COND_EQUALS,
        command::COND_GT,
        command::COND_EXISTS,
        command::COND_NAME,
        command::COND_AND,
        command::COND_OR,
        command::COND_A,
        command::COND_B,
        command::COND_NOT,
    ];

    /// Parses a single condition record (one of the `COND_*` shapes) from
    /// `bytes`, which must contain exactly one top-level record.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Truncated("CONDITION"));
        }
        let cmd = bytes[0];
        let mut table = ParseTable::new();
        if risp::process(&mut table, bytes, &Self::KNOWN) == 0 {
            return Err(DecodeError::Truncated("CONDITION"));
        }
        let rec = table
            .scalar(cmd, "CONDITION")?
            .ok_or(DecodeError::UnexpectedCommand(cmd, "CONDITION"))?;
        let payload = &rec.payload;

        match cmd {
            c if c == command::COND_EQUALS || c == command::COND_GT => {
                let mut inner = ParseTable::new();
                if risp::process(&mut inner, payload, &[command::KEY_ID, command::VALUE]) == 0 {
                    return Err(DecodeError::Truncated("COND_EQUALS"));
                }
                let key_id = decode_key_id(&inner)?;
                let value_rec = inner
                    .scalar(command::VALUE, "VALUE")?
                    .ok_or(DecodeError::MalformedCondition("missing VALUE"))?;
                let value = Value::deserialize(&value_rec.payload)
                    .map_err(|_| DecodeError::MalformedCondition("malformed VALUE"))?;
                Ok(if c == command::COND_EQUALS {
                    Condition::Equals { key_id, value }
                } else {
                    Condition::GreaterThan { key_id, value }
                })
            }
            c if c == command::COND_EXISTS => {
                let mut inner = ParseTable::new();
                if risp::process(&mut inner, payload, &[command::KEY_ID]) == 0 {
                    return Err(DecodeError::Truncated("COND_EXISTS"));
                }
                Ok(Condition::Exists {
                    key_id: decode_key_id(&inner)?,
                })
            }
            c if c == command::COND_NAME => {
                let mut inner = ParseTable::new();
                if risp::process(&mut inner, payload, &[command::NAME_ID, command::NAME]) == 0 {
                    return Err(DecodeError::Truncated("COND_NAME"));
                }
                let id_rec = inner.scalar(command::NAME_ID, "NAME_ID")?;
                let name_rec = inner.scalar(command::NAME, "NAME")?;
                match (id_rec, name_rec) {
                    (Some(_), Some(_)) => Err(DecodeError::MalformedCondition(
                        "COND_NAME has both NAME_ID and NAME",
                    )),
                    (None, None) => Err(DecodeError::MalformedCondition(
                        "COND_NAME has neither NAME_ID nor NAME",
                    )),
                    (Some(_), None) => {
                        let raw = inner.scalar_int(command::NAME_ID, "NAME_ID")?.unwrap();
                        let name_id = NameId::try_from(raw as i32)
                            .map_err(|_| DecodeError::MalformedCondition("invalid NAME_ID"))?;
                        Ok(Condition::Name(NameRef::Id(name_id)))
                    }
                    (None, Some(rec)) => {
                        let name = String::from_utf8(rec.payload.clone())
                            .map_err(|_| DecodeError::MalformedCondition("NAME is not utf8"))?;
                        Ok(Condition::Name(NameRef::Literal(name)))
                    }
                }
            }
            c if c == command::COND_AND || c == command::COND_OR => {
                let mut inner = ParseTable::new();
                if risp::process(&mut inner, payload, &[command::COND_A, command::COND_B]) == 0 {
                    return Err(DecodeError::Truncated("COND_AND/OR"));
                }
                let a_rec = inner
                    .scalar(command::COND_A, "COND_A")?
                    .ok_or(DecodeError::MalformedCondition("missing COND_A"))?;
                let b_rec = inner
                    .scalar(command::COND_B, "COND_B")?
                    .ok_or(DecodeError::MalformedCondition("missing COND_B"))?;
                let a = Condition::deserialize(&a_rec.payload)?;
                let b = Condition::deserialize(&b_rec.payload)?;
                Ok(if c == command::COND_AND {
                    Condition::And(Box::new(a), Box::new(b))
                } else {
                    Condition::Or(Box::new(a), Box::new(b))
                })
            }
            c if c == command::COND_NOT => {
                let inner = Condition::deserialize(payload)?;
                Ok(Condition::Not(Box::new(inner)))
            }
            _ => Err(DecodeError::UnexpectedCommand(cmd, "CONDITION")),
        }
    }
}

fn decode_key_id(table: &ParseTable) -> Result<KeyId, DecodeError> {
    let raw = table
        .scalar_int(command::KEY_ID, "KEY_ID")?
        .ok_or(DecodeError::MalformedCondition("missing KEY_ID"))?;
    KeyId::try_from(raw as i32).map_err(|_| DecodeError::MalformedCondition("invalid KEY_ID"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kid(n: u32) -> KeyId {
        KeyId::new(n).unwrap()
    }

    #[test]
    fn equals_round_trips() {
        let c = Condition::equals(kid(5), Value::Int(1));
        let mut buf = Vec::new();
        c.serialize(&mut buf).unwrap();
        assert_eq!(Condition::deserialize(&buf).unwrap(), c);
    }

    #[test]
    fn and_of_equals_and_exists_round_trips() {
        let c = Condition::equals(kid(5), Value::Int(1)).and(Condition::exists(kid(7)));
        let mut buf = Vec::new();
        c.serialize(&mut buf).unwrap();
        assert_eq!(Condition::deserialize(&buf).unwrap(), c);
    }

    #[test]
    fn not_round_trips() {
        let c = Condition::exists(kid(3)).not();
        let mut buf = Vec::new();
        c.serialize(&mut buf).unwrap();
        assert_eq!(Condition::deserialize(&buf).unwrap(), c);
    }

    #[test]
    fn greater_than_emits_its_own_wire_shape() {
        let c = Condition::greater_than(kid(2), Value::Int(9));
        let mut buf = Vec::new();
        c.serialize(&mut buf).unwrap();
        assert_eq!(buf[0], command::COND_GT);
        assert_ne!(command::COND_GT, command::COND_EQUALS);
        assert_eq!(Condition::deserialize(&buf).unwrap(), c);
    }

    #[test]
    fn name_variants_round_trip() {
        let by_id = Condition::name_id(NameId::new(4).unwrap());
        let mut buf = Vec::new();
        by_id.serialize(&mut buf).unwrap();
        assert_eq!(Condition::deserialize(&buf).unwrap(), by_id);

        let literal = Condition::name_literal("widgets");
        let mut buf = Vec::new();
        literal.serialize(&mut buf).unwrap();
        assert_eq!(Condition::deserialize(&buf).unwrap(), literal);
    }
}
