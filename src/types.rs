//! The type tags of the source language.

use std::fmt;

/// Type tag attached to every variable and expression.
///
/// Struct values are pointer shaped: a struct typed variable has type [`DataType::Ptr`] and
/// carries the struct name separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Int,
    Str,
    Void,
    Char,
    Float,
    Double,
    Ptr,
    U8,
    U16,
    U32,
    U64,
}

impl DataType {
    pub const ALL: [DataType; 11] = [
        DataType::Int,
        DataType::Str,
        DataType::Void,
        DataType::Char,
        DataType::Float,
        DataType::Double,
        DataType::Ptr,
        DataType::U8,
        DataType::U16,
        DataType::U32,
        DataType::U64,
    ];

    pub fn name(self) -> &'static str {
        match self {
            DataType::Int => "int",
            DataType::Str => "str",
            DataType::Void => "void",
            DataType::Char => "char",
            DataType::Float => "float",
            DataType::Double => "double",
            DataType::Ptr => "ptr",
            DataType::U8 => "u8",
            DataType::U16 => "u16",
            DataType::U32 => "u32",
            DataType::U64 => "u64",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.name() == name)
    }

    /// `int` and every unsigned width mix freely with each other.
    fn is_numeric(self) -> bool {
        matches!(
            self,
            DataType::Int | DataType::U8 | DataType::U16 | DataType::U32 | DataType::U64
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a value of type `t1` may meet a value of type `t2`.
///
/// `str` is compatible with everything. float, double, char and ptr only match themselves.
pub fn is_valid_types(t1: DataType, t2: DataType) -> bool {
    t1 == t2 || t1 == DataType::Str || t2 == DataType::Str || (t1.is_numeric() && t2.is_numeric())
}

#[cfg(test)]
mod tests {
    use super::DataType::*;
    use super::*;

    #[test]
    fn numeric_family() {
        assert!(is_valid_types(Int, U32));
        assert!(is_valid_types(U8, U64));
        assert!(is_valid_types(U16, Int));
        assert!(!is_valid_types(Float, Int));
        assert!(!is_valid_types(Double, Float));
        assert!(!is_valid_types(Char, U8));
        assert!(!is_valid_types(Ptr, U64));
    }

    #[test]
    fn str_matches_everything() {
        assert!(is_valid_types(Str, Char));
        for ty in DataType::ALL {
            assert!(is_valid_types(Str, ty));
            assert!(is_valid_types(ty, Str));
            assert!(is_valid_types(ty, ty));
        }
    }

    #[test]
    fn names() {
        for ty in DataType::ALL {
            assert_eq!(DataType::from_name(ty.name()), Some(ty));
        }
        assert_eq!(DataType::from_name("Point"), None);
    }
}
