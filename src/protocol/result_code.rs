//! Server-reported outcome codes, carried inside a [`super::reply::Reply`]
//! rather than surfaced as a Rust `Err` (see spec.md §7's propagation
//! policy: a request that reaches the server and gets a `FAILED` reply is
//! not an I/O failure, it's data).

/// Mirrors `STASH_ERR_*` from the original library's `stash.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Ok,
    UserExists,
    NotConnected,
    AuthFailed,
    InsufficientRights,
    UserNotExist,
    NamespaceNotExist,
    TableExists,
    GenericFailure,
    TableNotExist,
    NotUnique,
    NotStrict,
    RowExists,
    KeyNotExist,
    /// A code the server sent that this driver doesn't recognize. Carries the
    /// raw value so callers can still inspect it.
    Unknown(u32),
}

impl From<u32> for ResultCode {
    fn from(raw: u32) -> Self {
        match raw {
            0 => ResultCode::Ok,
            1 => ResultCode::UserExists,
            2 => ResultCode::NotConnected,
            3 => ResultCode::AuthFailed,
            4 => ResultCode::InsufficientRights,
            5 => ResultCode::UserNotExist,
            6 => ResultCode::NamespaceNotExist,
            7 => ResultCode::TableExists,
            8 => ResultCode::GenericFailure,
            9 => ResultCode::TableNotExist,
            10 => ResultCode::NotUnique,
            11 => ResultCode::NotStrict,
            12 => ResultCode::RowExists,
            13 => ResultCode::KeyNotExist,
            other => ResultCode::Unknown(other),
        }
    }
}

impl ResultCode {
    pub fn is_ok(self) -> bool {
        matches!(self, ResultCode::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_round_trip_from_raw() {
        assert_eq!(ResultCode::from(0), ResultCode::Ok);
        assert_eq!(ResultCode::from(3), ResultCode::AuthFailed);
        assert_eq!(ResultCode::from(13), ResultCode::KeyNotExist);
    }

    #[test]
    fn unrecognized_code_is_preserved() {
        assert_eq!(ResultCode::from(99), ResultCode::Unknown(99));
    }
}
