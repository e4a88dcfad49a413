//! Connection parameters: the authority (username/password) and the ordered
//! list of candidate servers, plus the `user/pass@host:port,host:port,...`
//! connection-string grammar.

use crate::error::{StashError, StashResult};
use crate::protocol::command::DEFAULT_PORT;
use secstr::SecUtf8;
use std::time::Duration;

/// One candidate server, as given in a connection string or added directly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerAddr {
    pub host: String,
    pub port: u16,
    /// Caller-assigned preference among servers in the same pool
    /// (spec.md §4.5's `add_server(host[:port], priority)`). Accepted and
    /// retained for inspection; the server list's actual try order is the
    /// order servers were added in, priority is not used to reorder it
    /// (spec's own "implementation may honor priority" escape hatch).
    pub priority: u8,
}

impl ServerAddr {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        ServerAddr {
            host: host.into(),
            port,
            priority: 0,
        }
    }

    pub fn with_priority(host: impl Into<String>, port: u16, priority: u8) -> Self {
        ServerAddr {
            host: host.into(),
            port,
            priority,
        }
    }
}

/// Everything needed to open a session: login authority plus the ordered
/// list of servers to try, head first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectParams {
    username: String,
    password: SecUtf8,
    servers: Vec<ServerAddr>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl ConnectParams {
    pub fn builder() -> ConnectParamsBuilder {
        ConnectParamsBuilder::new()
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &SecUtf8 {
        &self.password
    }

    pub fn servers(&self) -> &[ServerAddr] {
        &self.servers
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout
    }
}

/// Builds a [`ConnectParams`], either field by field or by parsing a
/// connection string with [`ConnectParamsBuilder::connstr`].
#[derive(Clone, Debug, Default)]
pub struct ConnectParamsBuilder {
    username: Option<String>,
    password: Option<SecUtf8>,
    servers: Vec<ServerAddr>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl ConnectParamsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(SecUtf8::from(password.into()));
        self
    }

    pub fn add_server(mut self, host: impl Into<String>, port: u16, priority: u8) -> Self {
        self.servers.push(ServerAddr::with_priority(host, port, priority));
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    /// Parses `user/pass@host:port,host:port,...` into this builder's
    /// fields, following the original library's `stash_connstr` grammar
    /// exactly: `/` ends the username, `@` ends the password and begins the
    /// server list, `,` separates server tokens, and a trailing `:port` is
    /// optional (defaulting to [`DEFAULT_PORT`]).
    pub fn connstr(mut self, s: &str) -> StashResult<Self> {
        let at = s
            .find('@')
            .ok_or_else(|| StashError::Config(format!("connection string {s:?} has no '@'")))?;
        let (authority, servers) = s.split_at(at);
        let servers = &servers[1..]; // drop '@'

        let slash = authority.find('/').ok_or_else(|| {
            StashError::Config(format!("connection string {s:?} has no '/' before '@'"))
        })?;
        let (username, password) = authority.split_at(slash);
        let password = &password[1..]; // drop '/'
        if username.is_empty() {
            return Err(StashError::Config(format!(
                "connection string {s:?} has an empty username"
            )));
        }

        self.username = Some(username.to_string());
        self.password = Some(SecUtf8::from(password.to_string()));

        for token in servers.split(',') {
            if token.is_empty() {
                return Err(StashError::Config(format!(
                    "connection string {s:?} has an empty server token"
                )));
            }
            let (host, port) = match token.rsplit_once(':') {
                Some((host, port_str)) => {
                    let port = port_str.parse::<u16>().map_err(|_| {
                        StashError::Config(format!("invalid port in server token {token:?}"))
                    })?;
                    (host, port)
                }
                None => (token, DEFAULT_PORT),
            };
            if host.is_empty() {
                return Err(StashError::Config(format!(
                    "server token {token:?} has an empty host"
                )));
            }
            self.servers.push(ServerAddr::new(host, port));
        }

        Ok(self)
    }

    pub fn build(self) -> StashResult<ConnectParams> {
        let username = self
            .username
            .ok_or(StashError::Usage("username is required"))?;
        let password = self
            .password
            .ok_or(StashError::Usage("password is required"))?;
        if self.servers.is_empty() {
            return Err(StashError::Usage("at least one server is required"));
        }
        Ok(ConnectParams {
            username,
            password,
            servers: self.servers,
            read_timeout: self.read_timeout,
            write_timeout: self.write_timeout,
        })
    }
}

/// Converts a value into [`ConnectParams`], so `Session::connect` can accept
/// either an owned struct or a raw connection string.
pub trait IntoConnectParams {
    fn into_connect_params(self) -> StashResult<ConnectParams>;
}

impl IntoConnectParams for ConnectParams {
    fn into_connect_params(self) -> StashResult<ConnectParams> {
        Ok(self)
    }
}

impl IntoConnectParams for &str {
    fn into_connect_params(self) -> StashResult<ConnectParams> {
        ConnectParamsBuilder::new().connstr(self)?.build()
    }
}

impl IntoConnectParams for String {
    fn into_connect_params(self) -> StashResult<ConnectParams> {
        self.as_str().into_connect_params()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connstr_parses_authority_and_single_server() {
        let params = "alice/secret@db.example.com:1234"
            .into_connect_params()
            .unwrap();
        assert_eq!(params.username(), "alice");
        assert_eq!(params.password().unsecure(), "secret");
        assert_eq!(
            params.servers(),
            &[ServerAddr::new("db.example.com", 1234)]
        );
    }

    #[test]
    fn connstr_defaults_port_and_supports_multiple_servers() {
        let params = "alice/secret@host1,host2:9999".into_connect_params().unwrap();
        assert_eq!(
            params.servers(),
            &[
                ServerAddr::new("host1", DEFAULT_PORT),
                ServerAddr::new("host2", 9999),
            ]
        );
    }

    #[test]
    fn connstr_without_at_is_an_error() {
        assert!("alice/secret".into_connect_params().is_err());
    }

    #[test]
    fn connstr_without_slash_is_an_error() {
        assert!("alice@host:1".into_connect_params().is_err());
    }

    #[test]
    fn builder_requires_username_password_and_server() {
        assert!(ConnectParamsBuilder::new().build().is_err());
        assert!(ConnectParamsBuilder::new()
            .username("a")
            .password("b")
            .build()
            .is_err());
    }
}
