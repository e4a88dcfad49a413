//! The public connection handle: owns the dispatcher and the authority, and
//! exposes one method per stash operation.

use crate::conn::dispatch::Dispatcher;
use crate::conn::params::{ConnectParams, IntoConnectParams};
use crate::error::{StashError, StashResult};
use crate::ids::{KeyId, NamespaceId, RowId, TableId, UserId};
use crate::protocol::condition::Condition;
use crate::protocol::options::{Rights, TableOptions};
use crate::protocol::reply::{Reply, ReplyPool};
use crate::protocol::request::{encode_request, NameArg, Operation, RequestIdGen};
use crate::protocol::result_code::ResultCode;
use crate::protocol::value::Value;
use log::debug;

/// A session against a stash server, or pool of servers.
///
/// Holds exactly one connection at a time; on connection loss the next
/// request rotates to the next server in the list and re-authenticates.
#[derive(Debug)]
pub struct Session {
    params: ConnectParams,
    dispatcher: Dispatcher,
    request_ids: RequestIdGen,
    user_id: Option<UserId>,
    reply_pool: ReplyPool,
}

impl Session {
    /// Connects to the head server named by `target` (a [`ConnectParams`] or
    /// a `user/pass@host:port,...` connection string) and logs in.
    pub fn connect(target: impl IntoConnectParams) -> StashResult<Self> {
        let params = target.into_connect_params()?;
        let mut dispatcher = Dispatcher::new(params.servers());
        dispatcher.set_timeouts(params.read_timeout(), params.write_timeout());
        let mut session = Session {
            params,
            dispatcher,
            request_ids: RequestIdGen::new(),
            user_id: None,
            reply_pool: ReplyPool::new(),
        };
        session.login()?;
        Ok(session)
    }

    /// Sends `op` and returns the reply, whatever its `result_code` (a
    /// server-reported `FAILED` is carried in the reply, not an `Err` — see
    /// spec.md §7). Only a transport or decode failure is a Rust `Err`.
    fn dispatch(&mut self, op: Operation) -> StashResult<Reply> {
        let request_id = self.request_ids.next();
        let bytes = encode_request(request_id, &op)?;
        self.dispatcher.send_request(&bytes)
    }

    /// Returns a reply the caller is finished with to the pool, for slot
    /// reuse by a later [`ReplyPool::insert`] (spec.md §3's `reply_pool`
    /// field, §4.3's `return_reply`).
    pub fn return_reply(&mut self, reply: Reply) -> usize {
        self.reply_pool.insert(reply)
    }

    /// Command ids seen on the wire that none of the five parse tables
    /// expected at that point (spec.md §4.1's diagnostics ring).
    pub fn unexpected_commands(&self) -> impl Iterator<Item = u8> + '_ {
        self.dispatcher.unexpected_commands()
    }

    /// Logging in is the one place a non-`Ok` result code still becomes a
    /// Rust `Err`: `connect()` can't hand back a half-authenticated
    /// `Session`, so a failed login must fail the whole call instead of
    /// returning a session the caller would have to notice isn't usable.
    fn login(&mut self) -> StashResult<()> {
        let username = self.params.username().to_string();
        let password = self.params.password().unsecure().to_string();
        let reply = self.dispatch(Operation::Login { username, password })?;
        if reply.result_code != ResultCode::Ok {
            return Err(StashError::ServerFailure(reply.result_code));
        }
        let user_id = reply.user_id.ok_or(StashError::NotConnected)?;
        debug!("logged in as user {user_id}");
        self.user_id = Some(user_id);
        Ok(())
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// Creates a user account. Mirrors `stash_create_username`'s
    /// `(stash_result_t, *uid)` out-param shape: the id is only meaningful
    /// when the result code is `Ok`.
    pub fn create_user(
        &mut self,
        username: &str,
        password: &str,
    ) -> StashResult<(ResultCode, Option<UserId>)> {
        let reply = self.dispatch(Operation::CreateUser {
            username: username.to_string(),
            password: password.to_string(),
        })?;
        Ok((reply.result_code, reply.user_id))
    }

    pub fn set_password(&mut self, user_id: UserId, password: &str) -> StashResult<ResultCode> {
        let reply = self.dispatch(Operation::SetPassword {
            user_id,
            password: password.to_string(),
        })?;
        Ok(reply.result_code)
    }

    pub fn grant(
        &mut self,
        user_id: UserId,
        namespace_id: NamespaceId,
        table_id: Option<TableId>,
        rights: Rights,
    ) -> StashResult<ResultCode> {
        let reply = self.dispatch(Operation::Grant {
            user_id,
            namespace_id,
            table_id,
            rights,
        })?;
        Ok(reply.result_code)
    }

    pub fn create_table(
        &mut self,
        namespace_id: NamespaceId,
        table: &str,
        options: TableOptions,
    ) -> StashResult<(ResultCode, Option<TableId>)> {
        let reply = self.dispatch(Operation::CreateTable {
            namespace_id,
            table: table.to_string(),
            options,
        })?;
        Ok((reply.result_code, reply.table_id))
    }

    /// Resolves a namespace name to its id (`GETID{NAMESPACE}`, mirroring
    /// `stash_get_namespace_id`).
    pub fn get_namespace_id(
        &mut self,
        namespace: &str,
    ) -> StashResult<(ResultCode, Option<NamespaceId>)> {
        let reply = self.dispatch(Operation::GetNamespaceId {
            namespace: namespace.to_string(),
        })?;
        Ok((reply.result_code, reply.namespace_id))
    }

    /// Resolves a table name within an already-resolved namespace to its id
    /// (`GETID{NAMESPACE_ID, TABLE}`, mirroring `stash_get_table_id`).
    pub fn get_table_id(
        &mut self,
        namespace_id: NamespaceId,
        table: &str,
    ) -> StashResult<(ResultCode, Option<TableId>)> {
        let reply = self.dispatch(Operation::GetTableId {
            namespace_id,
            table: table.to_string(),
        })?;
        Ok((reply.result_code, reply.table_id))
    }

    /// Resolves an attribute-key name within an already-resolved namespace
    /// and table to its id (`GETID{NAMESPACE_ID, TABLE_ID, KEY}`, mirroring
    /// `stash_get_key_id`).
    pub fn get_key_id(
        &mut self,
        namespace_id: NamespaceId,
        table_id: TableId,
        key: &str,
    ) -> StashResult<(ResultCode, Option<KeyId>)> {
        let reply = self.dispatch(Operation::GetKeyId {
            namespace_id,
            table_id,
            key: key.to_string(),
        })?;
        Ok((reply.result_code, reply.key_id))
    }

    /// Resolves a username to its id (`GETID{USERNAME}`, mirroring
    /// `stash_get_user_id`).
    pub fn get_user_id(&mut self, username: &str) -> StashResult<(ResultCode, Option<UserId>)> {
        let reply = self.dispatch(Operation::GetUserId {
            username: username.to_string(),
        })?;
        Ok((reply.result_code, reply.user_id))
    }

    pub fn create_row(
        &mut self,
        table_id: TableId,
        name: Option<&str>,
        attributes: Vec<(KeyId, Value)>,
    ) -> StashResult<Reply> {
        let name = match name {
            Some(s) => NameArg::Literal(s.to_string()),
            None => NameArg::Auto,
        };
        self.dispatch(Operation::CreateRow {
            table_id,
            name,
            attributes,
        })
    }

    pub fn set(
        &mut self,
        table_id: TableId,
        row_id: RowId,
        attributes: Vec<(KeyId, Value)>,
    ) -> StashResult<Reply> {
        self.dispatch(Operation::Set {
            table_id,
            row_id,
            attributes,
        })
    }

    pub fn set_expiry(&mut self, table_id: TableId, row_id: RowId, expires: i32) -> StashResult<Reply> {
        self.dispatch(Operation::SetExpiry {
            table_id,
            row_id,
            expires,
        })
    }

    pub fn delete(&mut self, table_id: TableId, row_id: RowId) -> StashResult<Reply> {
        self.dispatch(Operation::Delete { table_id, row_id })
    }

    pub fn query(
        &mut self,
        namespace_id: NamespaceId,
        table_id: TableId,
        condition: Option<Condition>,
        limit: Option<i64>,
    ) -> StashResult<Reply> {
        self.dispatch(Operation::Query {
            namespace_id,
            table_id,
            condition,
            limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conn::params::ServerAddr;
    use crate::conn::transport::mock::MockTransport;
    use crate::protocol::command;
    use crate::protocol::risp;

    fn session_with_mock(mock: MockTransport) -> Session {
        let dispatcher =
            Dispatcher::with_mock_head(ServerAddr::new("localhost", 13600), Box::new(mock));
        Session {
            params: ConnectParams::builder()
                .username("alice")
                .password("secret")
                .add_server("localhost", 13600, 0)
                .build()
                .unwrap(),
            dispatcher,
            request_ids: RequestIdGen::new(),
            user_id: None,
            reply_pool: ReplyPool::new(),
        }
    }

    fn encode_login_reply(request_id: i32, user_id: i32) -> Vec<u8> {
        let mut payload = Vec::new();
        risp::encode_int(&mut payload, command::REQUEST_ID, request_id).unwrap();
        risp::encode_int(&mut payload, command::USER_ID, user_id).unwrap();
        let mut out = Vec::new();
        risp::encode_record(&mut out, command::REPLY, &payload).unwrap();
        out
    }

    fn encode_failed(code: i32) -> Vec<u8> {
        let mut payload = Vec::new();
        risp::encode_int(&mut payload, command::FAILCODE, code).unwrap();
        let mut out = Vec::new();
        risp::encode_record(&mut out, command::FAILED, &payload).unwrap();
        out
    }

    #[test]
    fn successful_login_sets_user_id() {
        let mut mock = MockTransport::new();
        mock.push_reply(encode_login_reply(1, 42));
        let mut session = session_with_mock(mock);
        session.login().unwrap();
        assert_eq!(session.user_id().unwrap().get(), 42);
    }

    #[test]
    fn failed_login_surfaces_server_failure() {
        let mut mock = MockTransport::new();
        mock.push_reply(encode_failed(3));
        let mut session = session_with_mock(mock);
        let err = session.login().unwrap_err();
        assert!(matches!(
            err,
            StashError::ServerFailure(ResultCode::AuthFailed)
        ));
        assert!(session.user_id().is_none());
    }

    #[test]
    fn non_login_failure_is_carried_as_a_result_code() {
        let mut mock = MockTransport::new();
        mock.push_reply(encode_failed(9));
        let mut session = session_with_mock(mock);
        let reply = session
            .query(
                NamespaceId::new(1).unwrap(),
                TableId::new(1).unwrap(),
                None,
                None,
            )
            .unwrap();
        assert_eq!(reply.result_code, ResultCode::TableNotExist);
    }

    #[test]
    fn return_reply_frees_its_slot_for_reuse() {
        let mut mock = MockTransport::new();
        mock.push_reply(encode_login_reply(1, 42));
        let mut session = session_with_mock(mock);
        session.login().unwrap();
        let first = session.reply_pool.insert(Reply::failed(ResultCode::Ok));
        session.return_reply(Reply::failed(ResultCode::NotConnected));
        let second = session.reply_pool.insert(Reply::failed(ResultCode::Ok));
        assert_eq!(first, 0);
        assert_eq!(second, 1);
    }
}
