//! Fixed-width scalar values as they appear in MIR constants.
//!
//! A scalar is a bit pattern plus a width; signedness is a property of the
//! type that reads it, not of the value.

use std::fmt;

use thiserror::Error;

use crate::types::Size;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScalarError {
    #[error("scalar size mismatch: expected {expected} bytes, found {found} bytes")]
    SizeMismatch { expected: u64, found: u64 },
    #[error("scalar 0x{0:x} is not a valid bool")]
    InvalidBool(u128),
    #[error("scalar 0x{0:x} is not a valid char")]
    InvalidChar(u128),
}

/// Raw bits of an integer-like scalar. `data` never has bits set above
/// `size`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScalarInt {
    data: u128,
    size: u8,
}

impl ScalarInt {
    pub const TRUE: ScalarInt = ScalarInt { data: 1, size: 1 };
    pub const FALSE: ScalarInt = ScalarInt { data: 0, size: 1 };

    fn raw(data: u128, size: Size) -> Self {
        assert!(
            (1..=16).contains(&size.bytes),
            "invalid scalar size {} bytes",
            size.bytes
        );
        Self {
            data: size.truncate(data),
            size: size.bytes as u8,
        }
    }

    /// Returns `None` when `value` does not fit in `size` unsigned.
    pub fn try_from_uint(value: impl Into<u128>, size: Size) -> Option<Self> {
        let value = value.into();
        let scalar = Self::raw(value, size);
        (scalar.data == value).then_some(scalar)
    }

    /// Returns `None` when `value` does not fit in `size` as two's complement.
    pub fn try_from_int(value: impl Into<i128>, size: Size) -> Option<Self> {
        let value = value.into();
        let scalar = Self::raw(value as u128, size);
        (size.sign_extend(scalar.data) == value).then_some(scalar)
    }

    pub fn from_uint_truncated(value: u128, size: Size) -> Self {
        Self::raw(value, size)
    }

    pub fn from_int_truncated(value: i128, size: Size) -> Self {
        Self::raw(value as u128, size)
    }

    pub fn size(self) -> Size {
        Size::from_bytes(self.size as u64)
    }

    /// Raw bits, checked against the width the caller expects.
    pub fn to_bits(self, target: Size) -> Result<u128, ScalarError> {
        if target.bytes != self.size as u64 {
            return Err(ScalarError::SizeMismatch {
                expected: target.bytes,
                found: self.size as u64,
            });
        }
        Ok(self.data)
    }

    pub fn to_uint(self) -> u128 {
        self.data
    }

    pub fn to_int(self) -> i128 {
        self.size().sign_extend(self.data)
    }
}

impl fmt::Debug for ScalarInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:0width$x}", self.data, width = self.size as usize * 2)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scalar {
    Int(ScalarInt),
}

impl Scalar {
    pub const TRUE: Scalar = Scalar::Int(ScalarInt::TRUE);
    pub const FALSE: Scalar = Scalar::Int(ScalarInt::FALSE);

    pub fn from_bool(value: bool) -> Self {
        if value {
            Scalar::TRUE
        } else {
            Scalar::FALSE
        }
    }

    pub fn from_char(value: char) -> Self {
        Scalar::Int(ScalarInt::from_uint_truncated(
            value as u128,
            Size::from_bytes(4),
        ))
    }

    /// Truncates `value` to `size`.
    pub fn from_uint(value: u128, size: Size) -> Self {
        Scalar::Int(ScalarInt::from_uint_truncated(value, size))
    }

    /// Truncates `value` to `size`.
    pub fn from_int(value: i128, size: Size) -> Self {
        Scalar::Int(ScalarInt::from_int_truncated(value, size))
    }

    pub fn from_f32(value: f32) -> Self {
        Self::from_uint(value.to_bits() as u128, Size::from_bytes(4))
    }

    pub fn from_f64(value: f64) -> Self {
        Self::from_uint(value.to_bits() as u128, Size::from_bytes(8))
    }

    pub fn try_to_int(self) -> Option<ScalarInt> {
        match self {
            Scalar::Int(int) => Some(int),
        }
    }

    pub fn size(self) -> Size {
        match self {
            Scalar::Int(int) => int.size(),
        }
    }

    pub fn to_bits(self, size: Size) -> Result<u128, ScalarError> {
        match self {
            Scalar::Int(int) => int.to_bits(size),
        }
    }

    pub fn to_bool(self) -> Result<bool, ScalarError> {
        match self.to_bits(Size::from_bytes(1))? {
            0 => Ok(false),
            1 => Ok(true),
            bits => Err(ScalarError::InvalidBool(bits)),
        }
    }

    pub fn to_char(self) -> Result<char, ScalarError> {
        let bits = self.to_bits(Size::from_bytes(4))?;
        u32::try_from(bits)
            .ok()
            .and_then(char::from_u32)
            .ok_or(ScalarError::InvalidChar(bits))
    }

    pub fn to_f32(self) -> Result<f32, ScalarError> {
        Ok(f32::from_bits(self.to_bits(Size::from_bytes(4))? as u32))
    }

    pub fn to_f64(self) -> Result<f64, ScalarError> {
        Ok(f64::from_bits(self.to_bits(Size::from_bytes(8))? as u64))
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::from_bool(value)
    }
}

impl From<char> for Scalar {
    fn from(value: char) -> Self {
        Scalar::from_char(value)
    }
}

impl From<ScalarInt> for Scalar {
    fn from(value: ScalarInt) -> Self {
        Scalar::Int(value)
    }
}
