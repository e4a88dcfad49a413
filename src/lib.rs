//! Synchronous native rust client driver for the stash record store.
//!
//! `stash_client` speaks the stash server's binary wire protocol directly
//! over a plain TCP socket: no ORM layer, no schema mapping, just typed
//! requests in and typed replies out.
//!
//! ```no_run
//! use stash_client::Session;
//!
//! # fn main() -> stash_client::StashResult<()> {
//! let mut session = Session::connect("alice/secret@localhost:13600")?;
//! let (_, namespace_id) = session.get_namespace_id("widgets")?;
//! let namespace_id = namespace_id.unwrap();
//! let (_, table_id) = session.get_table_id(namespace_id, "inventory")?;
//! let table_id = table_id.unwrap();
//! let reply = session.create_row(table_id, None, vec![])?;
//! let row_id = reply.rows.first().and_then(|row| row.row_id);
//! # let _ = row_id;
//! # Ok(())
//! # }
//! ```

#![deny(missing_debug_implementations)]
#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

mod conn;
mod error;
mod ids;
mod protocol;
mod query;

pub use conn::{ConnectParams, ConnectParamsBuilder, IntoConnectParams, ServerAddr, Session};
pub use error::{DecodeError, EncodeError, StashError, StashResult};
pub use ids::{KeyId, NameId, NamespaceId, RowId, TableId, UserId};
pub use query::Query;

pub use protocol::condition::{Condition, NameRef};
pub use protocol::options::{Rights, TableOptions};
pub use protocol::reply::{Attribute, Reply, Row};
pub use protocol::request::{NameArg, Operation};
pub use protocol::result_code::ResultCode;
pub use protocol::value::Value;
