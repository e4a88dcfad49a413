//! Strictly-positive id newtypes.
//!
//! Every key id, namespace id, table id, user id, row id, and name id seen on
//! the wire is strictly positive; `0` is the in-band "unset" sentinel (see
//! `stash.h`'s bare `int`-typed ids, which the original library left to the
//! caller to keep positive by convention). Here that convention is a type.

use std::fmt;
use std::num::NonZeroU32;

macro_rules! id_newtype {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(NonZeroU32);

        impl $name {
            /// Wraps a raw positive id. Returns `None` for `0`.
            pub fn new(raw: u32) -> Option<Self> {
                NonZeroU32::new(raw).map(Self)
            }

            /// The raw wire value.
            pub fn get(self) -> u32 {
                self.0.get()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        impl TryFrom<u32> for $name {
            type Error = crate::error::StashError;

            fn try_from(raw: u32) -> Result<Self, Self::Error> {
                Self::new(raw).ok_or(crate::error::StashError::Usage(concat!(
                    stringify!($name),
                    " must be strictly positive"
                )))
            }
        }

        impl TryFrom<i32> for $name {
            type Error = crate::error::StashError;

            fn try_from(raw: i32) -> Result<Self, Self::Error> {
                if raw <= 0 {
                    Err(crate::error::StashError::Usage(concat!(
                        stringify!($name),
                        " must be strictly positive"
                    )))
                } else {
                    Ok(Self(NonZeroU32::new(raw as u32).unwrap()))
                }
            }
        }

        impl From<$name> for u32 {
            fn from(id: $name) -> u32 {
                id.0.get()
            }
        }
    };
}

id_newtype!(UserId, "Server-assigned user id.");
id_newtype!(NamespaceId, "Server-assigned namespace id.");
id_newtype!(TableId, "Server-assigned table id within a namespace.");
id_newtype!(KeyId, "Server-assigned attribute key id within a table.");
id_newtype!(RowId, "Server-assigned row id within a table.");
id_newtype!(NameId, "Server-assigned row-name id within a table.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_and_negative() {
        assert!(KeyId::new(0).is_none());
        assert!(KeyId::try_from(0_i32).is_err());
        assert!(KeyId::try_from(-1_i32).is_err());
        assert!(KeyId::try_from(5_i32).is_ok());
    }

    #[test]
    fn roundtrips_raw_value() {
        let id = TableId::new(7).unwrap();
        assert_eq!(id.get(), 7);
        assert_eq!(u32::from(id), 7);
    }
}
