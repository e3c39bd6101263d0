use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Classification of a type code.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TypeFlags: u8 {
        /// Valid as a dict-entry key.
        const BASIC = 0b0000_0001;
        const FIXED_SIZE = 0b0000_0010;
        const STRING_LIKE = 0b0000_0100;
        const CONTAINER = 0b0000_1000;
        const VARIANT = 0b0001_0000;
    }
}

/// A single D-Bus type code.
///
/// Closing brackets are not type codes of their own; `(` and `{` stand for the whole
/// struct and dict-entry respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeCode {
    Byte = b'y',
    Boolean = b'b',
    Int16 = b'n',
    UInt16 = b'q',
    Int32 = b'i',
    UInt32 = b'u',
    Int64 = b'x',
    UInt64 = b't',
    Double = b'd',
    UnixFd = b'h',
    String = b's',
    ObjectPath = b'o',
    Signature = b'g',
    Variant = b'v',
    Array = b'a',
    Struct = b'(',
    DictEntry = b'{',
}

impl TypeCode {
    pub fn from_u8(byte: u8) -> Option<TypeCode> {
        match byte {
            b'y' => Some(TypeCode::Byte),
            b'b' => Some(TypeCode::Boolean),
            b'n' => Some(TypeCode::Int16),
            b'q' => Some(TypeCode::UInt16),
            b'i' => Some(TypeCode::Int32),
            b'u' => Some(TypeCode::UInt32),
            b'x' => Some(TypeCode::Int64),
            b't' => Some(TypeCode::UInt64),
            b'd' => Some(TypeCode::Double),
            b'h' => Some(TypeCode::UnixFd),
            b's' => Some(TypeCode::String),
            b'o' => Some(TypeCode::ObjectPath),
            b'g' => Some(TypeCode::Signature),
            b'v' => Some(TypeCode::Variant),
            b'a' => Some(TypeCode::Array),
            b'(' => Some(TypeCode::Struct),
            b'{' => Some(TypeCode::DictEntry),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn as_char(self) -> char {
        char::from(self.as_u8())
    }

    pub fn flags(self) -> TypeFlags {
        match self {
            TypeCode::Byte
            | TypeCode::Boolean
            | TypeCode::Int16
            | TypeCode::UInt16
            | TypeCode::Int32
            | TypeCode::UInt32
            | TypeCode::Int64
            | TypeCode::UInt64
            | TypeCode::Double
            | TypeCode::UnixFd => TypeFlags::BASIC | TypeFlags::FIXED_SIZE,
            TypeCode::String | TypeCode::ObjectPath | TypeCode::Signature => {
                TypeFlags::BASIC | TypeFlags::STRING_LIKE
            }
            TypeCode::Variant => TypeFlags::VARIANT,
            TypeCode::Array | TypeCode::Struct | TypeCode::DictEntry => TypeFlags::CONTAINER,
        }
    }

    #[inline]
    pub fn is_basic(self) -> bool {
        self.flags().contains(TypeFlags::BASIC)
    }

    #[inline]
    pub fn is_container(self) -> bool {
        self.flags().contains(TypeFlags::CONTAINER)
    }

    /// Size in bytes of a marshalled fixed-size value, `None` for everything else.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            TypeCode::Byte => Some(1),
            TypeCode::Int16 | TypeCode::UInt16 => Some(2),
            TypeCode::Boolean | TypeCode::Int32 | TypeCode::UInt32 | TypeCode::UnixFd => Some(4),
            TypeCode::Int64 | TypeCode::UInt64 | TypeCode::Double => Some(8),
            _ => None,
        }
    }

    /// Alignment in bytes of a marshalled value of this type.
    pub fn alignment(self) -> usize {
        match self {
            TypeCode::Byte | TypeCode::Signature | TypeCode::Variant => 1,
            TypeCode::Int16 | TypeCode::UInt16 => 2,
            TypeCode::Boolean
            | TypeCode::Int32
            | TypeCode::UInt32
            | TypeCode::UnixFd
            | TypeCode::String
            | TypeCode::ObjectPath
            | TypeCode::Array => 4,
            TypeCode::Int64
            | TypeCode::UInt64
            | TypeCode::Double
            | TypeCode::Struct
            | TypeCode::DictEntry => 8,
        }
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALPHABET: &[u8] = b"ybnqiuxtdhsogva({";

    #[test]
    fn test_every_code_round_trips_through_u8() {
        for &byte in ALPHABET {
            let code = TypeCode::from_u8(byte).expect("alphabet byte must decode");
            assert_eq!(code.as_u8(), byte);
        }
    }

    #[test]
    fn test_closing_brackets_and_reserved_codes_are_not_type_codes() {
        for &byte in b")}rem*?@&^ \0" {
            assert_eq!(TypeCode::from_u8(byte), None, "{:?}", char::from(byte));
        }
    }

    #[test]
    fn test_variant_and_containers_are_not_basic() {
        let basic: Vec<char> = ALPHABET
            .iter()
            .filter_map(|&b| TypeCode::from_u8(b))
            .filter(|c| c.is_basic())
            .map(TypeCode::as_char)
            .collect();

        assert_eq!(basic.into_iter().collect::<String>(), "ybnqiuxtdhsog");
        assert!(!TypeCode::Variant.is_basic());
        assert!(TypeCode::Array.is_container());
    }

    #[test]
    fn test_fixed_size_types_align_to_their_size() {
        for &byte in ALPHABET {
            let code = TypeCode::from_u8(byte).unwrap();
            if let Some(size) = code.fixed_size() {
                assert!(code.flags().contains(TypeFlags::FIXED_SIZE));
                assert_eq!(code.alignment(), size, "{code}");
            }
        }
        assert_eq!(TypeCode::Struct.alignment(), 8);
        assert_eq!(TypeCode::Signature.fixed_size(), None);
    }
}
