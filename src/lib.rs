#![deny(unused_must_use)]
#![forbid(unsafe_code)]
//! Validation and decomposition of D-Bus type signatures.
//!
//! A signature such as `a{sv}` describes the layout of values in a D-Bus message. This crate
//! checks that a signature is well-formed and splits it into *single complete types*: the
//! smallest self-contained units (a basic type, a variant, or a whole container).
//!
//! ```
//! use dbus_signature::{Signature, validate};
//!
//! assert!(validate("a{sv}(ii)").is_ok());
//!
//! let signature = Signature::new("sa{sv}").unwrap();
//! let types: Vec<String> = signature.iter().map(|t| t.to_string()).collect();
//! assert_eq!(types, ["s", "a{sv}"]);
//! ```

pub mod err;

mod complete_types;
mod scanner;
mod settings;
mod signature;
mod type_code;
mod validator;

pub use crate::complete_types::{CompleteTypeRef, CompleteTypes};
pub use crate::err::{GrammarError, GrammarErrorKind, NestingKind, SignatureError};
pub use crate::settings::{
    MAX_CONTAINER_DEPTH, MAX_DICT_ENTRY_DEPTH, MAX_SIGNATURE_LENGTH, SignatureSettings,
};
pub use crate::signature::{Signature, SignatureIter, SingleCompleteType};
pub use crate::type_code::{TypeCode, TypeFlags};
pub use crate::validator::{validate, validate_with};

/// Validates `signature` and iterates its single complete types without copying.
pub fn iterate(signature: &str) -> err::GrammarResult<CompleteTypes<'_>> {
    CompleteTypes::new(signature)
}

#[cfg(test)]
use std::sync::Once;

#[cfg(test)]
static LOGGER_INIT: Once = Once::new();

// Rust runs the tests concurrently, so unless we synchronize logging access
// it will crash when attempting to run `cargo test` with some logging facilities.
#[cfg(test)]
pub fn ensure_env_logger_initialized() {
    use std::io::Write;

    LOGGER_INIT.call_once(|| {
        let mut builder = env_logger::Builder::from_default_env();
        builder
            .format(|buf, record| writeln!(buf, "[{}] - {}", record.level(), record.args()))
            .init();
    });
}
