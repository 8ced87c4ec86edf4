// src/sema/value.rs
//
// Tagged constant-value lattice. `ok` means the value is known at analysis
// time; `undef` marks the explicit undefined literal (ok is also true, and
// the backend may emit a poison value for it).

use std::rc::Rc;

use crate::sema::entities::{ErrorId, FnId};
use crate::sema::number::BigNum;
use crate::sema::types::TypeId;

/// Shared backing storage for pointer and array constants. Slicing and
/// string concatenation alias into these buffers rather than copying.
pub type ConstBuffer = Rc<Vec<ConstValue>>;

#[derive(Debug, Clone, Default)]
pub enum ConstData {
    #[default]
    None,
    Num(BigNum),
    Bool(bool),
    Fn(FnId),
    Type(TypeId),
    /// `Some` holds the wrapped payload; `None` is the null value.
    Optional(Option<Box<ConstValue>>),
    ErrUnion {
        /// `None` means the union holds its payload.
        err: Option<ErrorId>,
        payload: Option<Box<ConstValue>>,
    },
    PureError(ErrorId),
    EnumTag {
        tag: u64,
        payload: Option<Box<ConstValue>>,
    },
    Struct(Vec<ConstValue>),
    Array(ConstBuffer),
    Ptr {
        backing: ConstBuffer,
        len: u64,
    },
}

#[derive(Debug, Clone, Default)]
pub struct ConstValue {
    pub ok: bool,
    pub undef: bool,
    pub data: ConstData,
}

impl ConstValue {
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn num(n: BigNum) -> Self {
        ConstValue {
            ok: true,
            undef: false,
            data: ConstData::Num(n),
        }
    }

    pub fn int(v: u64) -> Self {
        Self::num(BigNum::from_u64(v))
    }

    pub fn bool_value(v: bool) -> Self {
        ConstValue {
            ok: true,
            undef: false,
            data: ConstData::Bool(v),
        }
    }

    pub fn ty(t: TypeId) -> Self {
        ConstValue {
            ok: true,
            undef: false,
            data: ConstData::Type(t),
        }
    }

    pub fn func(f: FnId) -> Self {
        ConstValue {
            ok: true,
            undef: false,
            data: ConstData::Fn(f),
        }
    }

    pub fn void() -> Self {
        ConstValue {
            ok: true,
            undef: false,
            data: ConstData::None,
        }
    }

    pub fn null() -> Self {
        ConstValue {
            ok: true,
            undef: false,
            data: ConstData::Optional(None),
        }
    }

    pub fn undefined() -> Self {
        ConstValue {
            ok: true,
            undef: true,
            data: ConstData::None,
        }
    }

    pub fn pure_error(err: ErrorId) -> Self {
        ConstValue {
            ok: true,
            undef: false,
            data: ConstData::PureError(err),
        }
    }

    /// Constant layout of a string slice: field 0 is a pointer into the
    /// per-byte backing, field 1 is the length as an `isize` constant.
    pub fn string_slice(bytes: &[u8]) -> Self {
        let backing: ConstBuffer = Rc::new(bytes.iter().map(|&b| ConstValue::int(b as u64)).collect());
        let len = bytes.len() as u64;
        ConstValue {
            ok: true,
            undef: false,
            data: ConstData::Struct(vec![
                ConstValue {
                    ok: true,
                    undef: false,
                    data: ConstData::Ptr { backing, len },
                },
                ConstValue::int(len),
            ]),
        }
    }

    /// Constant layout of a C string: a pointer value whose backing is the
    /// bytes followed by a trailing zero byte; `len` counts the NUL.
    pub fn c_string(bytes: &[u8]) -> Self {
        let mut chars: Vec<ConstValue> = bytes.iter().map(|&b| ConstValue::int(b as u64)).collect();
        chars.push(ConstValue::int(0));
        let len = chars.len() as u64;
        ConstValue {
            ok: true,
            undef: false,
            data: ConstData::Ptr {
                backing: Rc::new(chars),
                len,
            },
        }
    }

    pub fn as_num(&self) -> Option<&BigNum> {
        match &self.data {
            ConstData::Num(n) if self.ok => Some(n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match &self.data {
            ConstData::Bool(b) if self.ok => Some(*b),
            _ => None,
        }
    }

    pub fn as_type(&self) -> Option<TypeId> {
        match &self.data {
            ConstData::Type(t) if self.ok => Some(*t),
            _ => None,
        }
    }

    pub fn as_fn(&self) -> Option<FnId> {
        match &self.data {
            ConstData::Fn(f) if self.ok => Some(*f),
            _ => None,
        }
    }

    /// The `(ptr, len)` pair of a constant string slice, if this is one.
    pub fn as_string_slice(&self) -> Option<(&ConstBuffer, u64)> {
        match &self.data {
            ConstData::Struct(fields) if self.ok && fields.len() == 2 => match &fields[0].data {
                ConstData::Ptr { backing, len } => Some((backing, *len)),
                _ => None,
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_is_not_ok() {
        let v = ConstValue::unknown();
        assert!(!v.ok);
        assert!(v.as_num().is_none());
    }

    #[test]
    fn undefined_is_ok_and_undef() {
        let v = ConstValue::undefined();
        assert!(v.ok);
        assert!(v.undef);
    }

    #[test]
    fn string_slice_layout() {
        let v = ConstValue::string_slice(b"abc");
        let (backing, len) = v.as_string_slice().unwrap();
        assert_eq!(len, 3);
        assert_eq!(backing.len(), 3);
        assert_eq!(
            backing[0].as_num().unwrap(),
            &crate::sema::number::BigNum::from_u64(b'a' as u64)
        );
        // Field 1 repeats the length as an isize constant.
        let ConstData::Struct(fields) = &v.data else {
            panic!("expected struct constant");
        };
        assert_eq!(
            fields[1].as_num().unwrap(),
            &crate::sema::number::BigNum::from_u64(3)
        );
    }

    #[test]
    fn c_string_counts_the_nul() {
        let v = ConstValue::c_string(b"hi");
        let ConstData::Ptr { backing, len } = &v.data else {
            panic!("expected pointer constant");
        };
        assert_eq!(*len, 3);
        assert!(backing[2].as_num().unwrap().is_zero());
    }
}
