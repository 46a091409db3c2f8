//! Numeric constant arithmetic on scalars.
//!
//! Used for negated literals everywhere and for whole initializer
//! expressions of consts and statics. Integer results are range-checked
//! against the operand type instead of wrapping.

use rsmir_core::error::ConstEvalError;
use rsmir_core::mir::{BinOp, Scalar, ScalarInt, UnOp};
use rsmir_core::thir::Lit;
use rsmir_core::types::{FloatTy, Size, Ty, TyKind};

type EvalResult = Result<Scalar, ConstEvalError>;

/// Scalar for a literal of type `ty`; `None` for literals that are not
/// scalars (strings), do not match the type or do not fit it.
pub(super) fn literal_scalar(lit: &Lit, ty: &Ty) -> Option<Scalar> {
    match (lit, &ty.kind) {
        (Lit::Bool(value), TyKind::Bool) => Some(Scalar::from_bool(*value)),
        (Lit::Char(value), TyKind::Char) => Some(Scalar::from_char(*value)),
        (Lit::Int(value), TyKind::Int(int)) => signed_magnitude(*value, int.size(), false),
        (Lit::Int(value), TyKind::Uint(_)) => ty
            .scalar_size()
            .and_then(|size| ScalarInt::try_from_uint(*value, size))
            .map(Scalar::Int),
        (Lit::Int(value), TyKind::Float(FloatTy::F32)) => Some(Scalar::from_f32(*value as f32)),
        (Lit::Int(value), TyKind::Float(FloatTy::F64)) => Some(Scalar::from_f64(*value as f64)),
        (Lit::Float(value), TyKind::Float(FloatTy::F32)) => Some(Scalar::from_f32(*value as f32)),
        (Lit::Float(value), TyKind::Float(FloatTy::F64)) => Some(Scalar::from_f64(*value)),
        _ => None,
    }
}

/// Magnitude of a negated literal. A signed type takes one more than its
/// maximum here, so `-128_i8` is accepted while `128_i8` is not.
pub(super) fn negated_literal_magnitude(lit: &Lit, ty: &Ty) -> Option<Scalar> {
    match (lit, &ty.kind) {
        (Lit::Int(value), TyKind::Int(int)) => signed_magnitude(*value, int.size(), true),
        _ => literal_scalar(lit, ty),
    }
}

fn signed_magnitude(value: u128, size: Size, negated: bool) -> Option<Scalar> {
    let limit = 1u128 << (size.bits() - 1);
    let fits = if negated { value <= limit } else { value < limit };
    fits.then(|| Scalar::from_uint(value, size))
}

/// `-literal`. Wraps, so `-128_i8` folds from the magnitude `128`.
pub(super) fn negate_literal(value: Scalar, ty: &Ty) -> EvalResult {
    match &ty.kind {
        TyKind::Int(int) => {
            let size = int.size();
            let magnitude = size.sign_extend(value.to_bits(size)?);
            Ok(Scalar::from_int(magnitude.wrapping_neg(), size))
        }
        TyKind::Float(FloatTy::F32) => Ok(Scalar::from_f32(-value.to_f32()?)),
        TyKind::Float(FloatTy::F64) => Ok(Scalar::from_f64(-value.to_f64()?)),
        _ => Err(ConstEvalError::invalid_unary(UnOp::Neg, ty)),
    }
}

pub(super) fn eval_binary(
    op: BinOp,
    lhs: Scalar,
    rhs: Scalar,
    lhs_ty: &Ty,
    rhs_ty: &Ty,
) -> EvalResult {
    match &lhs_ty.kind {
        TyKind::Bool => eval_bool_binary(op, lhs.to_bool()?, rhs.to_bool()?, lhs_ty),
        TyKind::Char => compare(op, lhs.to_char()?, rhs.to_char()?)
            .map(Scalar::from_bool)
            .ok_or_else(|| ConstEvalError::invalid_binary(op, lhs_ty)),
        TyKind::Float(float) => eval_float_binary(op, lhs, rhs, *float, lhs_ty),
        TyKind::Int(_) | TyKind::Uint(_) => eval_int_binary(op, lhs, rhs, lhs_ty, rhs_ty),
        _ => Err(ConstEvalError::invalid_binary(op, lhs_ty)),
    }
}

fn compare<T: PartialOrd>(op: BinOp, lhs: T, rhs: T) -> Option<bool> {
    Some(match op {
        BinOp::Eq => lhs == rhs,
        BinOp::Ne => lhs != rhs,
        BinOp::Lt => lhs < rhs,
        BinOp::Le => lhs <= rhs,
        BinOp::Gt => lhs > rhs,
        BinOp::Ge => lhs >= rhs,
        _ => return None,
    })
}

fn eval_bool_binary(op: BinOp, lhs: bool, rhs: bool, ty: &Ty) -> EvalResult {
    if let Some(result) = compare(op, lhs, rhs) {
        return Ok(Scalar::from_bool(result));
    }
    let value = match op {
        BinOp::BitAnd => lhs & rhs,
        BinOp::BitOr => lhs | rhs,
        BinOp::BitXor => lhs ^ rhs,
        _ => return Err(ConstEvalError::invalid_binary(op, ty)),
    };
    Ok(Scalar::from_bool(value))
}

fn eval_float_binary(op: BinOp, lhs: Scalar, rhs: Scalar, float: FloatTy, ty: &Ty) -> EvalResult {
    match float {
        FloatTy::F32 => {
            let (a, b) = (lhs.to_f32()?, rhs.to_f32()?);
            if let Some(result) = compare(op, a, b) {
                return Ok(Scalar::from_bool(result));
            }
            let value = match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => a / b,
                BinOp::Rem => a % b,
                _ => return Err(ConstEvalError::invalid_binary(op, ty)),
            };
            Ok(Scalar::from_f32(value))
        }
        FloatTy::F64 => {
            let (a, b) = (lhs.to_f64()?, rhs.to_f64()?);
            if let Some(result) = compare(op, a, b) {
                return Ok(Scalar::from_bool(result));
            }
            let value = match op {
                BinOp::Add => a + b,
                BinOp::Sub => a - b,
                BinOp::Mul => a * b,
                BinOp::Div => a / b,
                BinOp::Rem => a % b,
                _ => return Err(ConstEvalError::invalid_binary(op, ty)),
            };
            Ok(Scalar::from_f64(value))
        }
    }
}

fn int_size(op: BinOp, ty: &Ty) -> Result<Size, ConstEvalError> {
    ty.scalar_size()
        .ok_or_else(|| ConstEvalError::invalid_binary(op, ty))
}

fn eval_int_binary(op: BinOp, lhs: Scalar, rhs: Scalar, lhs_ty: &Ty, rhs_ty: &Ty) -> EvalResult {
    let size = int_size(op, lhs_ty)?;
    let lhs_bits = lhs.to_bits(size)?;

    if op.is_shift() {
        let rhs_size = int_size(op, rhs_ty)?;
        let raw = rhs.to_bits(rhs_size)?;
        let amount = if rhs_ty.is_signed() {
            rhs_size.sign_extend(raw)
        } else {
            i128::try_from(raw).unwrap_or(i128::MAX)
        };
        if amount < 0 || amount >= size.bits() as i128 {
            return Err(ConstEvalError::ShiftOverflow { op, amount });
        }
        let amount = amount as u32;
        let value = match op {
            BinOp::Shl => lhs_bits << amount,
            _ if lhs_ty.is_signed() => (size.sign_extend(lhs_bits) >> amount) as u128,
            _ => lhs_bits >> amount,
        };
        return Ok(Scalar::from_uint(value, size));
    }

    let rhs_bits = rhs.to_bits(size)?;
    if lhs_ty.is_signed() {
        let (a, b) = (size.sign_extend(lhs_bits), size.sign_extend(rhs_bits));
        if let Some(result) = compare(op, a, b) {
            return Ok(Scalar::from_bool(result));
        }
        let value = match op {
            BinOp::Add => a.checked_add(b),
            BinOp::Sub => a.checked_sub(b),
            BinOp::Mul => a.checked_mul(b),
            BinOp::Div | BinOp::Rem => {
                check_divisor(op, b == 0)?;
                if a == size.signed_int_min() && b == -1 {
                    None
                } else if op == BinOp::Div {
                    a.checked_div(b)
                } else {
                    a.checked_rem(b)
                }
            }
            BinOp::BitAnd => Some(a & b),
            BinOp::BitOr => Some(a | b),
            BinOp::BitXor => Some(a ^ b),
            _ => return Err(ConstEvalError::invalid_binary(op, lhs_ty)),
        };
        match value {
            Some(value) if value >= size.signed_int_min() && value <= size.signed_int_max() => {
                Ok(Scalar::from_int(value, size))
            }
            _ => Err(ConstEvalError::Overflow { op }),
        }
    } else {
        let (a, b) = (lhs_bits, rhs_bits);
        if let Some(result) = compare(op, a, b) {
            return Ok(Scalar::from_bool(result));
        }
        let value = match op {
            BinOp::Add => a.checked_add(b),
            BinOp::Sub => a.checked_sub(b),
            BinOp::Mul => a.checked_mul(b),
            BinOp::Div => {
                check_divisor(op, b == 0)?;
                a.checked_div(b)
            }
            BinOp::Rem => {
                check_divisor(op, b == 0)?;
                a.checked_rem(b)
            }
            BinOp::BitAnd => Some(a & b),
            BinOp::BitOr => Some(a | b),
            BinOp::BitXor => Some(a ^ b),
            _ => return Err(ConstEvalError::invalid_binary(op, lhs_ty)),
        };
        match value {
            Some(value) if value <= size.unsigned_int_max() => Ok(Scalar::from_uint(value, size)),
            _ => Err(ConstEvalError::Overflow { op }),
        }
    }
}

fn check_divisor(op: BinOp, is_zero: bool) -> Result<(), ConstEvalError> {
    match (op, is_zero) {
        (BinOp::Div, true) => Err(ConstEvalError::DivisionByZero),
        (BinOp::Rem, true) => Err(ConstEvalError::RemainderByZero),
        _ => Ok(()),
    }
}

pub(super) fn eval_unary(op: UnOp, value: Scalar, ty: &Ty) -> EvalResult {
    match (op, &ty.kind) {
        (UnOp::Not, TyKind::Bool) => Ok(Scalar::from_bool(!value.to_bool()?)),
        (UnOp::Not, TyKind::Int(_) | TyKind::Uint(_)) => {
            let size = int_size(BinOp::BitXor, ty)?;
            Ok(Scalar::from_uint(!value.to_bits(size)?, size))
        }
        (UnOp::Neg, TyKind::Int(int)) => {
            let size = int.size();
            let signed = size.sign_extend(value.to_bits(size)?);
            if signed == size.signed_int_min() {
                return Err(ConstEvalError::NegOverflow);
            }
            Ok(Scalar::from_int(-signed, size))
        }
        (UnOp::Neg, TyKind::Float(_)) => negate_literal(value, ty),
        _ => Err(ConstEvalError::invalid_unary(op, ty)),
    }
}

/// Value of an integer-like scalar, sign-extended to 128 bits for signed
/// types.
fn int_like_bits(value: Scalar, ty: &Ty) -> Option<Result<u128, ConstEvalError>> {
    let size = match &ty.kind {
        TyKind::Bool | TyKind::Char | TyKind::Int(_) | TyKind::Uint(_) => ty.scalar_size()?,
        _ => return None,
    };
    Some(value.to_bits(size).map_err(ConstEvalError::from).map(|bits| {
        if ty.is_signed() {
            size.sign_extend(bits) as u128
        } else {
            bits
        }
    }))
}

fn float_value(value: Scalar, float: FloatTy) -> Result<f64, ConstEvalError> {
    Ok(match float {
        FloatTy::F32 => value.to_f32()? as f64,
        FloatTy::F64 => value.to_f64()?,
    })
}

fn float_to_int(value: f64, to: &Ty, size: Size) -> Scalar {
    if to.is_signed() {
        let clamped = (value as i128).clamp(size.signed_int_min(), size.signed_int_max());
        Scalar::from_int(clamped, size)
    } else {
        Scalar::from_uint((value as u128).min(size.unsigned_int_max()), size)
    }
}

/// `value as to`, following the saturating float→int and truncating
/// int→int rules of `as`.
pub(super) fn eval_cast(value: Scalar, from: &Ty, to: &Ty) -> EvalResult {
    let invalid = || ConstEvalError::InvalidCast {
        from: from.clone(),
        to: to.clone(),
    };
    match (&from.kind, &to.kind) {
        (TyKind::Float(from_float), TyKind::Float(to_float)) => {
            let value = float_value(value, *from_float)?;
            Ok(match to_float {
                FloatTy::F32 => Scalar::from_f32(value as f32),
                FloatTy::F64 => Scalar::from_f64(value),
            })
        }
        (TyKind::Float(from_float), TyKind::Int(_) | TyKind::Uint(_)) => {
            let size = to.scalar_size().ok_or_else(invalid)?;
            Ok(float_to_int(float_value(value, *from_float)?, to, size))
        }
        (TyKind::Int(_) | TyKind::Uint(_), TyKind::Float(to_float)) => {
            let bits = int_like_bits(value, from).ok_or_else(invalid)??;
            Ok(match (from.is_signed(), to_float) {
                (true, FloatTy::F32) => Scalar::from_f32(bits as i128 as f32),
                (true, FloatTy::F64) => Scalar::from_f64(bits as i128 as f64),
                (false, FloatTy::F32) => Scalar::from_f32(bits as f32),
                (false, FloatTy::F64) => Scalar::from_f64(bits as f64),
            })
        }
        (_, TyKind::Int(_) | TyKind::Uint(_)) => {
            let size = to.scalar_size().ok_or_else(invalid)?;
            let bits = int_like_bits(value, from).ok_or_else(invalid)??;
            Ok(Scalar::from_uint(bits, size))
        }
        (TyKind::Uint(_), TyKind::Char) => {
            let bits = int_like_bits(value, from).ok_or_else(invalid)??;
            u32::try_from(bits)
                .ok()
                .and_then(char::from_u32)
                .map(Scalar::from_char)
                .ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}
