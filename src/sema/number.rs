// src/sema/number.rs
//
// Tagged arbitrary-precision number used by constant evaluation. Integers
// are exact (num-bigint); floats are f64, which matches the precision the
// language exposes.

use num_bigint::BigInt;
use num_traits::{Signed, ToPrimitive, Zero};
use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum BigNum {
    Int(BigInt),
    Float(f64),
}

/// Why a constant operation could not produce a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumError {
    DivisionByZero,
    /// Shift amount is negative or absurdly large.
    BadShiftAmount,
    /// Integer-only operation applied to a float operand.
    NotAnInteger,
}

impl BigNum {
    pub fn from_u64(v: u64) -> Self {
        BigNum::Int(BigInt::from(v))
    }

    pub fn from_i64(v: i64) -> Self {
        BigNum::Int(BigInt::from(v))
    }

    pub fn from_f64(v: f64) -> Self {
        BigNum::Float(v)
    }

    pub fn is_int(&self) -> bool {
        matches!(self, BigNum::Int(_))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, BigNum::Float(_))
    }

    pub fn is_negative(&self) -> bool {
        match self {
            BigNum::Int(i) => i.is_negative(),
            BigNum::Float(f) => *f < 0.0,
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            BigNum::Int(i) => i.is_zero(),
            BigNum::Float(f) => *f == 0.0,
        }
    }

    /// Whether the integer value is representable in `bits` bits with the
    /// given signedness. Floats never fit an integer type.
    pub fn fits_in_bits(&self, bits: u64, signed: bool) -> bool {
        let BigNum::Int(v) = self else {
            return false;
        };
        let one = BigInt::from(1u8);
        if signed {
            let bound = &one << (bits - 1) as usize;
            *v >= -&bound && *v < bound
        } else {
            if v.is_negative() {
                return false;
            }
            *v < (&one << bits as usize)
        }
    }

    pub fn to_u64(&self) -> Option<u64> {
        match self {
            BigNum::Int(i) => i.to_u64(),
            BigNum::Float(_) => None,
        }
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            BigNum::Int(i) => i.to_f64().unwrap_or(f64::INFINITY),
            BigNum::Float(f) => *f,
        }
    }

    fn as_float_pair(&self, other: &BigNum) -> (f64, f64) {
        (self.to_f64(), other.to_f64())
    }

    pub fn negate(&self) -> BigNum {
        match self {
            BigNum::Int(i) => BigNum::Int(-i),
            BigNum::Float(f) => BigNum::Float(-f),
        }
    }

    pub fn add(&self, other: &BigNum) -> Result<BigNum, NumError> {
        match (self, other) {
            (BigNum::Int(a), BigNum::Int(b)) => Ok(BigNum::Int(a + b)),
            _ => {
                let (a, b) = self.as_float_pair(other);
                Ok(BigNum::Float(a + b))
            }
        }
    }

    pub fn sub(&self, other: &BigNum) -> Result<BigNum, NumError> {
        match (self, other) {
            (BigNum::Int(a), BigNum::Int(b)) => Ok(BigNum::Int(a - b)),
            _ => {
                let (a, b) = self.as_float_pair(other);
                Ok(BigNum::Float(a - b))
            }
        }
    }

    pub fn mul(&self, other: &BigNum) -> Result<BigNum, NumError> {
        match (self, other) {
            (BigNum::Int(a), BigNum::Int(b)) => Ok(BigNum::Int(a * b)),
            _ => {
                let (a, b) = self.as_float_pair(other);
                Ok(BigNum::Float(a * b))
            }
        }
    }

    pub fn div(&self, other: &BigNum) -> Result<BigNum, NumError> {
        if other.is_zero() {
            return Err(NumError::DivisionByZero);
        }
        match (self, other) {
            (BigNum::Int(a), BigNum::Int(b)) => Ok(BigNum::Int(a / b)),
            _ => {
                let (a, b) = self.as_float_pair(other);
                Ok(BigNum::Float(a / b))
            }
        }
    }

    pub fn rem(&self, other: &BigNum) -> Result<BigNum, NumError> {
        if other.is_zero() {
            return Err(NumError::DivisionByZero);
        }
        match (self, other) {
            (BigNum::Int(a), BigNum::Int(b)) => Ok(BigNum::Int(a % b)),
            _ => {
                let (a, b) = self.as_float_pair(other);
                Ok(BigNum::Float(a % b))
            }
        }
    }

    fn int_pair<'a>(&'a self, other: &'a BigNum) -> Result<(&'a BigInt, &'a BigInt), NumError> {
        match (self, other) {
            (BigNum::Int(a), BigNum::Int(b)) => Ok((a, b)),
            _ => Err(NumError::NotAnInteger),
        }
    }

    pub fn bit_or(&self, other: &BigNum) -> Result<BigNum, NumError> {
        let (a, b) = self.int_pair(other)?;
        Ok(BigNum::Int(a | b))
    }

    pub fn bit_and(&self, other: &BigNum) -> Result<BigNum, NumError> {
        let (a, b) = self.int_pair(other)?;
        Ok(BigNum::Int(a & b))
    }

    pub fn bit_xor(&self, other: &BigNum) -> Result<BigNum, NumError> {
        let (a, b) = self.int_pair(other)?;
        Ok(BigNum::Int(a ^ b))
    }

    pub fn shl(&self, other: &BigNum) -> Result<BigNum, NumError> {
        let (a, b) = self.int_pair(other)?;
        let amount = b.to_u64().ok_or(NumError::BadShiftAmount)?;
        if amount > u16::MAX as u64 {
            return Err(NumError::BadShiftAmount);
        }
        Ok(BigNum::Int(a << amount as usize))
    }

    pub fn shr(&self, other: &BigNum) -> Result<BigNum, NumError> {
        let (a, b) = self.int_pair(other)?;
        let amount = b.to_u64().ok_or(NumError::BadShiftAmount)?;
        if amount > u16::MAX as u64 {
            return Ok(BigNum::Int(BigInt::from(0u8)));
        }
        Ok(BigNum::Int(a >> amount as usize))
    }

    pub fn compare(&self, other: &BigNum) -> Ordering {
        match (self, other) {
            (BigNum::Int(a), BigNum::Int(b)) => a.cmp(b),
            _ => {
                let (a, b) = self.as_float_pair(other);
                a.partial_cmp(&b).unwrap_or(Ordering::Equal)
            }
        }
    }
}

impl fmt::Display for BigNum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BigNum::Int(i) => write!(f, "{}", i),
            BigNum::Float(v) => write!(f, "{}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_unsigned_bounds() {
        assert!(BigNum::from_u64(255).fits_in_bits(8, false));
        assert!(!BigNum::from_u64(256).fits_in_bits(8, false));
        assert!(!BigNum::from_i64(-1).fits_in_bits(8, false));
    }

    #[test]
    fn fits_signed_bounds() {
        assert!(BigNum::from_i64(127).fits_in_bits(8, true));
        assert!(!BigNum::from_i64(128).fits_in_bits(8, true));
        assert!(BigNum::from_i64(-128).fits_in_bits(8, true));
        assert!(!BigNum::from_i64(-129).fits_in_bits(8, true));
    }

    #[test]
    fn exact_integer_arithmetic() {
        let a = BigNum::from_u64(u64::MAX);
        let b = BigNum::from_u64(u64::MAX);
        let sum = a.add(&b).unwrap();
        // No silent wrapping: the sum exceeds u64 but stays exact.
        assert!(!sum.fits_in_bits(64, false));
        assert!(sum.fits_in_bits(65, false));
    }

    #[test]
    fn division_by_zero_reported() {
        let a = BigNum::from_u64(1);
        let zero = BigNum::from_u64(0);
        assert_eq!(a.div(&zero), Err(NumError::DivisionByZero));
        assert_eq!(a.rem(&zero), Err(NumError::DivisionByZero));
    }

    #[test]
    fn mixed_arithmetic_promotes_to_float() {
        let a = BigNum::from_u64(1);
        let b = BigNum::from_f64(0.5);
        assert_eq!(a.add(&b).unwrap(), BigNum::Float(1.5));
    }

    #[test]
    fn bitwise_rejects_floats() {
        let a = BigNum::from_f64(1.0);
        let b = BigNum::from_u64(1);
        assert_eq!(a.bit_or(&b), Err(NumError::NotAnInteger));
    }

    #[test]
    fn shift_right_past_width_is_zero() {
        let a = BigNum::from_u64(1);
        let big = BigNum::Int(num_bigint::BigInt::from(1u128 << 80));
        assert!(a.shr(&big).unwrap().is_zero());
    }

    #[test]
    fn compare_across_kinds() {
        assert_eq!(
            BigNum::from_u64(2).compare(&BigNum::from_f64(1.5)),
            Ordering::Greater
        );
    }

    #[test]
    fn display_matches_diagnostic_format() {
        assert_eq!(BigNum::from_u64(300).to_string(), "300");
        assert_eq!(BigNum::from_i64(-7).to_string(), "-7");
    }
}
