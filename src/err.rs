use std::collections::TryReserveError;
use std::fmt;

use thiserror::Error;

pub type GrammarResult<T> = std::result::Result<T, GrammarError>;
pub type Result<T> = std::result::Result<T, SignatureError>;

/// Which nesting bound was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NestingKind {
    /// Arrays and structs share a single bound.
    ArrayOrStruct,
    DictEntry,
}

impl fmt::Display for NestingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NestingKind::ArrayOrStruct => f.write_str("array/struct"),
            NestingKind::DictEntry => f.write_str("dict-entry"),
        }
    }
}

fn escape_code(code: &u8) -> std::ascii::EscapeDefault {
    code.escape_ascii()
}

/// A violation of the signature grammar.
///
/// Every variant carries the byte offset at which the violation was detected.
/// The validator stops at the first violation, so for a given input the error is deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GrammarError {
    #[error("offset {offset}: unknown type code `{}`", escape_code(.code))]
    UnknownTypeCode { code: u8, offset: usize },

    #[error("offset {offset}: struct has no fields")]
    EmptyStruct { offset: usize },

    #[error("offset {offset}: dict-entry is only allowed as the element type of an array")]
    DictEntryOutsideArray { offset: usize },

    #[error("offset {offset}: dict-entry key must be a basic type")]
    InvalidDictKeyType { offset: usize },

    #[error("offset {offset}: dict-entry must hold exactly two types, found {found}")]
    WrongDictEntryArity { found: usize, offset: usize },

    #[error("offset {offset}: container opened here is never closed")]
    UnterminatedContainer { offset: usize },

    #[error("offset {offset}: unbalanced close bracket `{}`", escape_code(.bracket))]
    UnbalancedCloseBracket { bracket: u8, offset: usize },

    #[error("offset {offset}: {kind} nesting exceeds the limit of {limit}")]
    NestingTooDeep {
        kind: NestingKind,
        limit: u32,
        offset: usize,
    },

    #[error("offset {offset}: array marker has no element type")]
    DanglingArrayMarker { offset: usize },

    #[error("signature is {len} bytes long, the limit is {max}")]
    SignatureTooLong { len: usize, max: usize },
}

/// Fieldless mirror of [`GrammarError`], convenient for matching and counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrammarErrorKind {
    UnknownTypeCode,
    EmptyStruct,
    DictEntryOutsideArray,
    InvalidDictKeyType,
    WrongDictEntryArity,
    UnterminatedContainer,
    UnbalancedCloseBracket,
    NestingTooDeep(NestingKind),
    DanglingArrayMarker,
    SignatureTooLong,
}

impl GrammarError {
    /// Byte offset (relative to the start of the signature) at which the error was detected.
    pub fn offset(&self) -> usize {
        match *self {
            GrammarError::UnknownTypeCode { offset, .. }
            | GrammarError::EmptyStruct { offset }
            | GrammarError::DictEntryOutsideArray { offset }
            | GrammarError::InvalidDictKeyType { offset }
            | GrammarError::WrongDictEntryArity { offset, .. }
            | GrammarError::UnterminatedContainer { offset }
            | GrammarError::UnbalancedCloseBracket { offset, .. }
            | GrammarError::NestingTooDeep { offset, .. }
            | GrammarError::DanglingArrayMarker { offset } => offset,
            // Detected before scanning, at the first byte past the limit.
            GrammarError::SignatureTooLong { max, .. } => max,
        }
    }

    pub fn kind(&self) -> GrammarErrorKind {
        match *self {
            GrammarError::UnknownTypeCode { .. } => GrammarErrorKind::UnknownTypeCode,
            GrammarError::EmptyStruct { .. } => GrammarErrorKind::EmptyStruct,
            GrammarError::DictEntryOutsideArray { .. } => GrammarErrorKind::DictEntryOutsideArray,
            GrammarError::InvalidDictKeyType { .. } => GrammarErrorKind::InvalidDictKeyType,
            GrammarError::WrongDictEntryArity { .. } => GrammarErrorKind::WrongDictEntryArity,
            GrammarError::UnterminatedContainer { .. } => GrammarErrorKind::UnterminatedContainer,
            GrammarError::UnbalancedCloseBracket { .. } => {
                GrammarErrorKind::UnbalancedCloseBracket
            }
            GrammarError::NestingTooDeep { kind, .. } => GrammarErrorKind::NestingTooDeep(kind),
            GrammarError::DanglingArrayMarker { .. } => GrammarErrorKind::DanglingArrayMarker,
            GrammarError::SignatureTooLong { .. } => GrammarErrorKind::SignatureTooLong,
        }
    }
}

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("corrupt type signature: {0}")]
    Grammar(#[from] GrammarError),

    #[error("expected a single complete type, found {found}")]
    NotSingleCompleteType { found: usize },

    #[error("failed to allocate {len} bytes for a signature")]
    AllocationFailed {
        len: usize,
        #[source]
        source: TryReserveError,
    },
}

impl SignatureError {
    pub fn grammar(&self) -> Option<&GrammarError> {
        match self {
            SignatureError::Grammar(e) => Some(e),
            SignatureError::NotSingleCompleteType { .. }
            | SignatureError::AllocationFailed { .. } => None,
        }
    }
}
