//! The RISP command-id space and the width class each range implies.
//!
//! The high bits of a command id select the payload shape (spec.md §4.1);
//! this mirrors the table at the top of `stash.h` in the original library,
//! reproduced here as named constants instead of raw `#define`s.

/// The shape of the payload that follows a command id, determined purely by
/// which 32-wide range the id falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidthClass {
    /// 0-31: marker, no payload.
    Marker,
    /// 32-63: boolean flag, no payload.
    Flag,
    /// 64-95: 1-byte unsigned integer payload.
    U8,
    /// 96-127: 2-byte big-endian integer payload.
    U16,
    /// 128-159: 4-byte big-endian integer payload.
    U32,
    /// 160-191: 1-byte length-prefixed bytes.
    ShortBytes,
    /// 192-223: 2-byte length-prefixed bytes.
    MidBytes,
    /// 224-255: 4-byte length-prefixed bytes (used for nested records).
    LongBytes,
}

impl WidthClass {
    /// Determines the width class implied by a command id's high bits.
    pub const fn of(cmd: u8) -> Self {
        match cmd {
            0..=31 => Self::Marker,
            32..=63 => Self::Flag,
            64..=95 => Self::U8,
            96..=127 => Self::U16,
            128..=159 => Self::U32,
            160..=191 => Self::ShortBytes,
            192..=223 => Self::MidBytes,
            224..=255 => Self::LongBytes,
        }
    }

    /// Maximum payload length this width class's length prefix can express.
    pub const fn max_len(self) -> usize {
        match self {
            Self::Marker | Self::Flag | Self::U8 | Self::U16 | Self::U32 => 0,
            Self::ShortBytes => u8::MAX as usize,
            Self::MidBytes => u16::MAX as usize,
            Self::LongBytes => u32::MAX as usize,
        }
    }
}

// Markers (0-31)
pub const NOP: u8 = 0;
pub const CLEAR: u8 = 1;
pub const AUTO: u8 = 3;

// Flags (32-63)
pub const TRUE: u8 = 32;
pub const FALSE: u8 = 33;
pub const RIGHT_ADDUSER: u8 = 34;
pub const RIGHT_CREATE: u8 = 35;
pub const RIGHT_DROP: u8 = 36;
pub const RIGHT_SET: u8 = 37;
pub const RIGHT_UPDATE: u8 = 38;
pub const RIGHT_DELETE: u8 = 39;
pub const RIGHT_QUERY: u8 = 40;
pub const RIGHT_LOCK: u8 = 41;
pub const STRICT: u8 = 42;
pub const UNIQUE: u8 = 43;
pub const OVERWRITE: u8 = 44;
pub const TRANSIENT: u8 = 45;
pub const NULL: u8 = 46;
pub const SORTASC: u8 = 47;
pub const SORTDESC: u8 = 48;

// 2-byte ints (96-127)
pub const NAMESPACE_ID: u8 = 97;
pub const FAILCODE: u8 = 98;

// 4-byte ints (128-159)
pub const REQUEST_ID: u8 = 130;
pub const INTEGER: u8 = 131;
pub const TABLE_ID: u8 = 132;
pub const ROW_ID: u8 = 133;
pub const NAME_ID: u8 = 135;
pub const KEY_ID: u8 = 136;
pub const USER_ID: u8 = 137;
pub const COUNT: u8 = 139;
pub const EXPIRES: u8 = 140;

// short strings (160-191)
pub const USERNAME: u8 = 160;
pub const PASSWORD: u8 = 161;
pub const NAMESPACE: u8 = 162;
pub const TABLE: u8 = 163;
pub const NAME: u8 = 164;
pub const KEY: u8 = 165;
pub const COND_EXISTS: u8 = 166;
pub const SET_EXPIRY: u8 = 167;
pub const DELETE: u8 = 168;

// strings (192-223)
pub const CREATE_USER: u8 = 192;
pub const SET_PASSWORD: u8 = 194;
pub const GRANT: u8 = 195;
pub const LOGIN: u8 = 202;
pub const FAILED: u8 = 204;
pub const GETID: u8 = 205;
pub const CREATE_TABLE: u8 = 206;
pub const COND_NAME: u8 = 222;
pub const COND_EQUALS: u8 = 223;

// nested records (224-255)
pub const REQUEST: u8 = 224;
pub const REPLY: u8 = 225;
pub const QUERY: u8 = 226;
pub const SET: u8 = 227;
pub const STRING: u8 = 231;
pub const VALUE: u8 = 235;
pub const ATTRIBUTE: u8 = 236;
pub const CREATE_ROW: u8 = 237;
pub const CONDITION: u8 = 238;
pub const ROW: u8 = 239;
pub const COND_AND: u8 = 240;
pub const COND_OR: u8 = 241;
pub const COND_A: u8 = 242;
pub const COND_B: u8 = 243;
pub const COND_NOT: u8 = 244;

/// Wire extension (see DESIGN.md): `GreaterThan` conditions get their own
/// record instead of being folded into [`COND_EQUALS`] as the original
/// library's `build_condition` does.
pub const COND_GT: u8 = 245;

/// Default TCP port for a stash server.
pub const DEFAULT_PORT: u16 = 13600;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_class_matches_ranges() {
        assert_eq!(WidthClass::of(NOP), WidthClass::Marker);
        assert_eq!(WidthClass::of(TRUE), WidthClass::Flag);
        assert_eq!(WidthClass::of(NAMESPACE_ID), WidthClass::U16);
        assert_eq!(WidthClass::of(INTEGER), WidthClass::U32);
        assert_eq!(WidthClass::of(USERNAME), WidthClass::ShortBytes);
        assert_eq!(WidthClass::of(CREATE_USER), WidthClass::MidBytes);
        assert_eq!(WidthClass::of(REQUEST), WidthClass::LongBytes);
    }
}
