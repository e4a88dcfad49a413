//! Request envelope assembly: each [`Operation`] knows how to write its own
//! payload shape; [`encode_request`] wraps it in `REQUEST{REQUEST_ID, ...}`.

use crate::error::EncodeError;
use crate::ids::{KeyId, NamespaceId, RowId, TableId, UserId};
use crate::protocol::command;
use crate::protocol::condition::Condition;
use crate::protocol::options::{Rights, TableOptions};
use crate::protocol::risp;
use crate::protocol::value::Value;

/// A row or attribute-key name: either a literal string (server assigns or
/// looks up the id) or a previously resolved id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameArg {
    Literal(String),
    Auto,
}

/// One admin or data operation a [`crate::Session`] can send. Each variant
/// owns exactly the arguments its wire shape needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    CreateUser {
        username: String,
        password: String,
    },
    SetPassword {
        user_id: UserId,
        password: String,
    },
    Grant {
        user_id: UserId,
        namespace_id: NamespaceId,
        table_id: Option<TableId>,
        rights: Rights,
    },
    Login {
        username: String,
        password: String,
    },
    CreateTable {
        namespace_id: NamespaceId,
        table: String,
        options: TableOptions,
    },
    /// Resolves a namespace name to its id (`GETID{NAMESPACE}`).
    GetNamespaceId { namespace: String },
    /// Resolves a table name within a namespace to its id
    /// (`GETID{NAMESPACE_ID, TABLE}`).
    GetTableId {
        namespace_id: NamespaceId,
        table: String,
    },
    /// Resolves an attribute-key name within a table to its id
    /// (`GETID{NAMESPACE_ID, TABLE_ID, KEY}`).
    GetKeyId {
        namespace_id: NamespaceId,
        table_id: TableId,
        key: String,
    },
    /// Resolves a username to its id (`GETID{USERNAME}`).
    GetUserId { username: String },
    CreateRow {
        table_id: TableId,
        name: NameArg,
        attributes: Vec<(KeyId, Value)>,
    },
    Set {
        table_id: TableId,
        row_id: RowId,
        attributes: Vec<(KeyId, Value)>,
    },
    SetExpiry {
        table_id: TableId,
        row_id: RowId,
        expires: i32,
    },
    Delete {
        table_id: TableId,
        row_id: RowId,
    },
    Query {
        namespace_id: NamespaceId,
        table_id: TableId,
        condition: Option<Condition>,
        limit: Option<i64>,
    },
}

fn encode_attributes(buf: &mut Vec<u8>, attrs: &[(KeyId, Value)]) -> Result<(), EncodeError> {
    for (key_id, value) in attrs {
        let mut attr = Vec::new();
        risp::encode_int(&mut attr, command::KEY_ID, key_id.get() as i32)?;
        value.serialize(&mut attr)?;
        risp::encode_record(buf, command::ATTRIBUTE, &attr)?;
    }
    Ok(())
}

impl Operation {
    /// Appends this operation's own record (`LOGIN{...}`, `CREATE_ROW{...}`,
    /// etc.) to `buf`.
    pub fn serialize(&self, buf: &mut Vec<u8>) -> Result<(), EncodeError> {
        match self {
            Operation::CreateUser { username, password } => {
                let mut inner = Vec::new();
                risp::encode_bytes(&mut inner, command::USERNAME, username.as_bytes())?;
                risp::encode_bytes(&mut inner, command::PASSWORD, password.as_bytes())?;
                risp::encode_record(buf, command::CREATE_USER, &inner)
            }
            Operation::SetPassword { user_id, password } => {
                let mut inner = Vec::new();
                risp::encode_int(&mut inner, command::USER_ID, user_id.get() as i32)?;
                risp::encode_bytes(&mut inner, command::PASSWORD, password.as_bytes())?;
                risp::encode_record(buf, command::SET_PASSWORD, &inner)
            }
            Operation::Grant {
                user_id,
                namespace_id,
                table_id,
                rights,
            } => {
                let mut inner = Vec::new();
                risp::encode_int(&mut inner, command::USER_ID, user_id.get() as i32)?;
                risp::encode_int(&mut inner, command::NAMESPACE_ID, namespace_id.get() as i32)?;
                if let Some(table_id) = table_id {
                    risp::encode_int(&mut inner, command::TABLE_ID, table_id.get() as i32)?;
                }
                for flag in rights.flag_commands() {
                    risp::encode_marker(&mut inner, flag);
                }
                risp::encode_record(buf, command::GRANT, &inner)
            }
            Operation::Login { username, password } => {
                let mut inner = Vec::new();
                risp::encode_bytes(&mut inner, command::USERNAME, username.as_bytes())?;
                risp::encode_bytes(&mut inner, command::PASSWORD, password.as_bytes())?;
                risp::encode_record(buf, command::LOGIN, &inner)
            }
            Operation::CreateTable {
                namespace_id,
                table,
                options,
            } => {
                let mut inner = Vec::new();
                risp::encode_int(&mut inner, command::NAMESPACE_ID, namespace_id.get() as i32)?;
                risp::encode_bytes(&mut inner, command::TABLE, table.as_bytes())?;
                if options.is_unique() {
                    risp::encode_marker(&mut inner, command::UNIQUE);
                }
                if options.is_strict() {
                    risp::encode_marker(&mut inner, command::STRICT);
                }
                if options.is_overwrite() {
                    risp::encode_marker(&mut inner, command::OVERWRITE);
                }
                risp::encode_record(buf, command::CREATE_TABLE, &inner)
            }
            Operation::GetNamespaceId { namespace } => {
                let mut inner = Vec::new();
                risp::encode_bytes(&mut inner, command::NAMESPACE, namespace.as_bytes())?;
                risp::encode_record(buf, command::GETID, &inner)
            }
            Operation::GetTableId { namespace_id, table } => {
                let mut inner = Vec::new();
                risp::encode_int(&mut inner, command::NAMESPACE_ID, namespace_id.get() as i32)?;
                risp::encode_bytes(&mut inner, command::TABLE, table.as_bytes())?;
                risp::encode_record(buf, command::GETID, &inner)
            }
            Operation::GetKeyId {
                namespace_id,
                table_id,
                key,
            } => {
                let mut inner = Vec::new();
                risp::encode_int(&mut inner, command::NAMESPACE_ID, namespace_id.get() as i32)?;
                risp::encode_int(&mut inner, command::TABLE_ID, table_id.get() as i32)?;
                risp::encode_bytes(&mut inner, command::KEY, key.as_bytes())?;
                risp::encode_record(buf, command::GETID, &inner)
            }
            Operation::GetUserId { username } => {
                let mut inner = Vec::new();
                risp::encode_bytes(&mut inner, command::USERNAME, username.as_bytes())?;
                risp::encode_record(buf, command::GETID, &inner)
            }
            Operation::CreateRow {
                table_id,
                name,
                attributes,
            } => {
                let mut inner = Vec::new();
                risp::encode_int(&mut inner, command::TABLE_ID, table_id.get() as i32)?;
                match name {
                    NameArg::Literal(s) => {
                        risp::encode_bytes(&mut inner, command::NAME, s.as_bytes())?
                    }
                    NameArg::Auto => risp::encode_marker(&mut inner, command::AUTO),
                }
                encode_attributes(&mut inner, attributes)?;
                risp::encode_record(buf, command::CREATE_ROW, &inner)
            }
            Operation::Set {
                table_id,
                row_id,
                attributes,
            } => {
                let mut inner = Vec::new();
                risp::encode_int(&mut inner, command::TABLE_ID, table_id.get() as i32)?;
                risp::encode_int(&mut inner, command::ROW_ID, row_id.get() as i32)?;
                encode_attributes(&mut inner, attributes)?;
                risp::encode_record(buf, command::SET, &inner)
            }
            Operation::SetExpiry {
                table_id,
                row_id,
                expires,
            } => {
                let mut inner = Vec::new();
                risp::encode_int(&mut inner, command::TABLE_ID, table_id.get() as i32)?;
                risp::encode_int(&mut inner, command::ROW_ID, row_id.get() as i32)?;
                risp::encode_int(&mut inner, command::EXPIRES, *expires)?;
                risp::encode_record(buf, command::SET_EXPIRY, &inner)
            }
            Operation::Delete { table_id, row_id } => {
                let mut inner = Vec::new();
                risp::encode_int(&mut inner, command::TABLE_ID, table_id.get() as i32)?;
                risp::encode_int(&mut inner, command::ROW_ID, row_id.get() as i32)?;
                risp::encode_record(buf, command::DELETE, &inner)
            }
            Operation::Query {
                namespace_id,
                table_id,
                condition,
                limit,
            } => {
                let mut inner = Vec::new();
                risp::encode_int(&mut inner, command::NAMESPACE_ID, namespace_id.get() as i32)?;
                risp::encode_int(&mut inner, command::TABLE_ID, table_id.get() as i32)?;
                if let Some(condition) = condition {
                    let mut cond_buf = Vec::new();
                    condition.serialize(&mut cond_buf)?;
                    risp::encode_record(&mut inner, command::CONDITION, &cond_buf)?;
                }
                if let Some(limit) = limit {
                    risp::encode_int(&mut inner, command::COUNT, *limit as i32)?;
                }
                risp::encode_record(buf, command::QUERY, &inner)
            }
        }
    }
}

/// Wraps `op` in `REQUEST{REQUEST_ID, <op>}`.
pub fn encode_request(request_id: i32, op: &Operation) -> Result<Vec<u8>, EncodeError> {
    let mut inner = Vec::new();
    risp::encode_int(&mut inner, command::REQUEST_ID, request_id)?;
    op.serialize(&mut inner)?;
    let mut out = Vec::new();
    risp::encode_record(&mut out, command::REQUEST, &inner)?;
    Ok(out)
}

/// Monotonic request id counter: increments from 1, wraps `i32::MAX` back to
/// `1` (never `0`, which the wire protocol treats as unset).
#[derive(Debug, Default)]
pub struct RequestIdGen(i32);

impl RequestIdGen {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn next(&mut self) -> i32 {
        self.0 = if self.0 == i32::MAX { 1 } else { self.0 + 1 };
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_gen_wraps_at_i32_max() {
        let mut gen = RequestIdGen::new();
        assert_eq!(gen.next(), 1);
        assert_eq!(gen.next(), 2);
        gen.0 = i32::MAX;
        assert_eq!(gen.next(), 1);
    }

    #[test]
    fn login_wraps_in_request_envelope() {
        let op = Operation::Login {
            username: "alice".into(),
            password: "secret".into(),
        };
        let bytes = encode_request(7, &op).unwrap();
        assert_eq!(bytes[0], command::REQUEST);

        let mut table = crate::protocol::risp::ParseTable::new();
        assert!(risp::process(&mut table, &bytes, &[command::REQUEST]) > 0);
        let rec = table.scalar(command::REQUEST, "REQUEST").unwrap().unwrap();

        let mut inner = crate::protocol::risp::ParseTable::new();
        risp::process(
            &mut inner,
            &rec.payload,
            &[command::REQUEST_ID, command::LOGIN],
        );
        assert_eq!(
            inner.scalar_int(command::REQUEST_ID, "REQUEST_ID").unwrap(),
            Some(7)
        );
        assert!(inner.is_set(command::LOGIN));
    }

    #[test]
    fn query_with_condition_and_limit_serializes() {
        let op = Operation::Query {
            namespace_id: NamespaceId::new(1).unwrap(),
            table_id: TableId::new(1).unwrap(),
            condition: Some(Condition::exists(KeyId::new(1).unwrap())),
            limit: Some(10),
        };
        let mut buf = Vec::new();
        op.serialize(&mut buf).unwrap();
        assert_eq!(buf[0], command::QUERY);
    }
}
