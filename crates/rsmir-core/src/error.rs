use std::result;

use thiserror::Error;

use crate::mir::scalar::ScalarError;
use crate::mir::{BinOp, UnOp};
use crate::span::Span;
use crate::types::Ty;

/// Failure while folding a constant initializer.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConstEvalError {
    #[error("attempt to compute `{op}` which would overflow")]
    Overflow { op: BinOp },
    #[error("attempt to negate with overflow")]
    NegOverflow,
    #[error("attempt to divide by zero")]
    DivisionByZero,
    #[error("attempt to calculate the remainder with a divisor of zero")]
    RemainderByZero,
    #[error("attempt to shift with `{op}` by {amount}, which would overflow")]
    ShiftOverflow { op: BinOp, amount: i128 },
    #[error("cannot cast `{from}` to `{to}` in a constant")]
    InvalidCast { from: Ty, to: Ty },
    #[error("`{op}` is not defined for `{ty}` in a constant")]
    InvalidOperand { op: String, ty: Ty },
    #[error(transparent)]
    Scalar(#[from] ScalarError),
}

impl ConstEvalError {
    pub fn invalid_binary(op: BinOp, ty: &Ty) -> Self {
        ConstEvalError::InvalidOperand {
            op: op.to_string(),
            ty: ty.clone(),
        }
    }

    pub fn invalid_unary(op: UnOp, ty: &Ty) -> Self {
        ConstEvalError::InvalidOperand {
            op: op.to_string(),
            ty: ty.clone(),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("unsupported construct: {construct}")]
    Unsupported { construct: String, span: Span },
    #[error("constant evaluation failed: {error}")]
    ConstEval { error: ConstEvalError, span: Span },
    #[error("MIR build interrupted")]
    Interrupted,
    #[error("Generic error: {0}")]
    Generic(String),
}

impl Error {
    pub fn unsupported(construct: impl Into<String>, span: Span) -> Self {
        Error::Unsupported {
            construct: construct.into(),
            span,
        }
    }

    pub fn const_eval(error: ConstEvalError, span: Span) -> Self {
        Error::ConstEval { error, span }
    }

    /// Errors that only poison the current item; the rest of the program
    /// can still be built.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Unsupported { .. } | Error::ConstEval { .. })
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Error::Unsupported { span, .. } | Error::ConstEval { span, .. } => Some(*span),
            Error::Interrupted | Error::Generic(_) => None,
        }
    }

    /// Stable diagnostic code.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Unsupported { .. } => "unsupported",
            Error::ConstEval { .. } => "const-eval",
            Error::Interrupted => "interrupted",
            Error::Generic(_) => "internal",
        }
    }
}

pub type Result<T> = result::Result<T, Error>;

// Convert from eyre::Report to our Error type
impl From<eyre::Report> for Error {
    fn from(err: eyre::Report) -> Self {
        Error::Generic(err.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Generic(s)
    }
}
