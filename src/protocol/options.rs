//! Bitmask option sets: table-create flags and grant rights.
//!
//! Plain `const`s plus `BitOr`, matching the teacher's `command_options.rs`
//! idiom rather than pulling in the `bitflags` crate for two small sets.

use std::ops::{BitOr, BitOrAssign};

/// Flags accepted by `CREATE_TABLE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableOptions(u8);

impl TableOptions {
    pub const NONE: TableOptions = TableOptions(0);
    pub const UNIQUE: TableOptions = TableOptions(1);
    pub const STRICT: TableOptions = TableOptions(2);
    pub const OVERWRITE: TableOptions = TableOptions(4);

    pub fn contains(self, other: TableOptions) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn is_unique(self) -> bool {
        self.contains(Self::UNIQUE)
    }

    pub fn is_strict(self) -> bool {
        self.contains(Self::STRICT)
    }

    pub fn is_overwrite(self) -> bool {
        self.contains(Self::OVERWRITE)
    }
}

impl BitOr for TableOptions {
    type Output = TableOptions;
    fn bitor(self, rhs: TableOptions) -> TableOptions {
        TableOptions(self.0 | rhs.0)
    }
}

impl BitOrAssign for TableOptions {
    fn bitor_assign(&mut self, rhs: TableOptions) {
        self.0 |= rhs.0;
    }
}

/// Rights grantable to a user over a namespace or table, mirroring the
/// `RIGHT_*` flag records in [`super::command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rights(u8);

impl Rights {
    pub const NONE: Rights = Rights(0);
    pub const ADDUSER: Rights = Rights(1);
    pub const CREATE: Rights = Rights(2);
    pub const DROP: Rights = Rights(4);
    pub const SET: Rights = Rights(8);
    pub const UPDATE: Rights = Rights(16);
    pub const DELETE: Rights = Rights(32);
    pub const QUERY: Rights = Rights(64);
    pub const LOCK: Rights = Rights(128);

    pub fn contains(self, other: Rights) -> bool {
        self.0 & other.0 == other.0
    }

    /// The `RIGHT_*` flag command ids set in this mask, in ascending order.
    pub fn flag_commands(self) -> Vec<u8> {
        use crate::protocol::command::*;
        let table = [
            (Rights::ADDUSER, RIGHT_ADDUSER),
            (Rights::CREATE, RIGHT_CREATE),
            (Rights::DROP, RIGHT_DROP),
            (Rights::SET, RIGHT_SET),
            (Rights::UPDATE, RIGHT_UPDATE),
            (Rights::DELETE, RIGHT_DELETE),
            (Rights::QUERY, RIGHT_QUERY),
            (Rights::LOCK, RIGHT_LOCK),
        ];
        table
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, cmd)| *cmd)
            .collect()
    }
}

impl BitOr for Rights {
    type Output = Rights;
    fn bitor(self, rhs: Rights) -> Rights {
        Rights(self.0 | rhs.0)
    }
}

impl BitOrAssign for Rights {
    fn bitor_assign(&mut self, rhs: Rights) {
        self.0 |= rhs.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_options_combine_with_bitor() {
        let opts = TableOptions::UNIQUE | TableOptions::STRICT;
        assert!(opts.is_unique());
        assert!(opts.is_strict());
        assert!(!opts.is_overwrite());
    }

    #[test]
    fn rights_list_matching_flag_commands() {
        let r = Rights::CREATE | Rights::QUERY;
        let mut cmds = r.flag_commands();
        cmds.sort();
        let mut expected = vec![
            crate::protocol::command::RIGHT_CREATE,
            crate::protocol::command::RIGHT_QUERY,
        ];
        expected.sort();
        assert_eq!(cmds, expected);
    }
}
