use log::debug;

use crate::err::{GrammarError, GrammarResult};
use crate::scanner::{Scan, ScanContext};
use crate::settings::SignatureSettings;

/// Checks that `signature` is a sequence of zero or more well-formed single complete types,
/// using the D-Bus default limits.
///
/// The empty signature is valid. The first violation found in a left-to-right scan is reported.
pub fn validate(signature: impl AsRef<[u8]>) -> GrammarResult<()> {
    validate_with(signature, &SignatureSettings::default())
}

pub fn validate_with(signature: impl AsRef<[u8]>, settings: &SignatureSettings) -> GrammarResult<()> {
    let buf = signature.as_ref();
    let result = validate_bytes(buf, settings);

    match &result {
        Ok(()) => debug!("signature `{}` is valid", buf.escape_ascii()),
        Err(e) => debug!("signature `{}` is invalid: {e}", buf.escape_ascii()),
    }
    result
}

fn validate_bytes(buf: &[u8], settings: &SignatureSettings) -> GrammarResult<()> {
    if let Some(max) = settings.get_max_length() {
        if buf.len() > max {
            return Err(GrammarError::SignatureTooLong {
                len: buf.len(),
                max,
            });
        }
    }

    let mut scan = Scan::new(settings, ScanContext::TopLevel);
    let mut pos = 0;
    while let Some(end) = scan.next_end(buf, pos)? {
        pos = end;
    }
    Ok(())
}

/// Number of single complete types in an already-validated signature.
pub(crate) fn count_complete_types(buf: &[u8]) -> usize {
    let mut scan = Scan::unbounded(ScanContext::TopLevel);
    let mut pos = 0;
    let mut count = 0;
    while let Ok(Some(end)) = scan.next_end(buf, pos) {
        pos = end;
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::err::{GrammarErrorKind, NestingKind};
    use crate::ensure_env_logger_initialized;
    use pretty_assertions::assert_eq;

    fn kind_of(sig: &str) -> GrammarErrorKind {
        validate(sig).expect_err(sig).kind()
    }

    #[test]
    fn test_accepts_well_formed_signatures() {
        ensure_env_logger_initialized();
        for sig in [
            "",
            "y",
            "q",
            "x",
            "t",
            "h",
            "sog",
            "v",
            "a{sv}",
            "a{iv}",
            "a{s(ia{sv})}",
            "(ii)",
            "((i)(s))",
            "aai",
            "aa{oa{sa{sv}}}",
            "a(sa{sv}as)",
            "ia{sv}(ii)v",
        ] {
            assert_eq!(validate(sig), Ok(()), "{sig}");
        }
    }

    #[test]
    fn test_rejects_unknown_type_codes() {
        assert_eq!(
            validate("iz"),
            Err(GrammarError::UnknownTypeCode {
                code: b'z',
                offset: 1
            })
        );
        // Reserved by the D-Bus specification, never valid in a signature.
        for sig in ["r", "e", "m", "*", "?", "@", "&", "^", " ", "\0"] {
            assert_eq!(kind_of(sig), GrammarErrorKind::UnknownTypeCode, "{sig:?}");
        }
    }

    #[test]
    fn test_rejects_empty_struct() {
        assert_eq!(validate("()"), Err(GrammarError::EmptyStruct { offset: 1 }));
        assert_eq!(kind_of("a(i())"), GrammarErrorKind::EmptyStruct);
    }

    #[test]
    fn test_rejects_dict_entry_outside_array() {
        assert_eq!(
            validate("{iv}"),
            Err(GrammarError::DictEntryOutsideArray { offset: 0 })
        );
        assert_eq!(kind_of("({sv})"), GrammarErrorKind::DictEntryOutsideArray);
        assert_eq!(kind_of("a{s{sv}}"), GrammarErrorKind::DictEntryOutsideArray);
    }

    #[test]
    fn test_rejects_non_basic_or_missing_dict_key() {
        assert_eq!(
            validate("a{vi}"),
            Err(GrammarError::InvalidDictKeyType { offset: 2 })
        );
        assert_eq!(kind_of("a{(i)s}"), GrammarErrorKind::InvalidDictKeyType);
        assert_eq!(kind_of("a{ais}"), GrammarErrorKind::InvalidDictKeyType);
        assert_eq!(kind_of("a{}"), GrammarErrorKind::InvalidDictKeyType);
    }

    #[test]
    fn test_rejects_wrong_dict_entry_arity() {
        assert_eq!(
            validate("a{s}"),
            Err(GrammarError::WrongDictEntryArity {
                found: 1,
                offset: 3
            })
        );
        assert_eq!(
            validate("a{sss}"),
            Err(GrammarError::WrongDictEntryArity {
                found: 3,
                offset: 4
            })
        );
        assert_eq!(kind_of("a{ssa{sv}}"), GrammarErrorKind::WrongDictEntryArity);
    }

    #[test]
    fn test_rejects_unbalanced_brackets() {
        assert_eq!(
            validate("("),
            Err(GrammarError::UnterminatedContainer { offset: 0 })
        );
        assert_eq!(
            validate(")"),
            Err(GrammarError::UnbalancedCloseBracket {
                bracket: b')',
                offset: 0
            })
        );
        assert_eq!(
            validate("i(s(i)"),
            Err(GrammarError::UnterminatedContainer { offset: 1 })
        );
        assert_eq!(kind_of("a{sv"), GrammarErrorKind::UnterminatedContainer);
        assert_eq!(kind_of("a{sv)"), GrammarErrorKind::UnbalancedCloseBracket);
        assert_eq!(kind_of("(i}"), GrammarErrorKind::UnbalancedCloseBracket);
        assert_eq!(kind_of("}"), GrammarErrorKind::UnbalancedCloseBracket);
    }

    #[test]
    fn test_rejects_dangling_array_markers() {
        assert_eq!(
            validate("ia"),
            Err(GrammarError::DanglingArrayMarker { offset: 1 })
        );
        assert_eq!(kind_of("aa"), GrammarErrorKind::DanglingArrayMarker);
        assert_eq!(kind_of("(a)"), GrammarErrorKind::DanglingArrayMarker);
        assert_eq!(kind_of("(ia"), GrammarErrorKind::DanglingArrayMarker);
        assert_eq!(kind_of("a}"), GrammarErrorKind::DanglingArrayMarker);
    }

    #[test]
    fn test_array_nesting_is_bounded_at_32() {
        let ok = format!("{}i", "a".repeat(32));
        let too_deep = format!("{}i", "a".repeat(33));

        assert_eq!(validate(&ok), Ok(()));
        assert_eq!(
            validate(&too_deep),
            Err(GrammarError::NestingTooDeep {
                kind: NestingKind::ArrayOrStruct,
                limit: 32,
                offset: 32
            })
        );
    }

    #[test]
    fn test_arrays_and_structs_share_a_bound() {
        let ok = format!("{}{}i{}", "a".repeat(16), "(".repeat(16), ")".repeat(16));
        let too_deep = format!("{}{}i{}", "a".repeat(16), "(".repeat(17), ")".repeat(17));

        assert_eq!(validate(&ok), Ok(()));
        assert_eq!(
            kind_of(&too_deep),
            GrammarErrorKind::NestingTooDeep(NestingKind::ArrayOrStruct)
        );
    }

    #[test]
    fn test_dict_entry_nesting_has_its_own_bound() {
        let settings = SignatureSettings::default()
            .max_dict_entry_depth(2)
            .max_length(None);

        assert_eq!(validate_with("a{sa{sv}}", &settings), Ok(()));
        assert_eq!(
            validate_with("a{sa{sa{sv}}}", &settings).map_err(|e| e.kind()),
            Err(GrammarErrorKind::NestingTooDeep(NestingKind::DictEntry))
        );
    }

    #[test]
    fn test_length_limit_is_configurable() {
        let long = "i".repeat(256);
        assert_eq!(
            validate(&long),
            Err(GrammarError::SignatureTooLong { len: 256, max: 255 })
        );
        assert_eq!(validate(&long[..255]), Ok(()));

        let settings = SignatureSettings::default().max_length(None);
        assert_eq!(validate_with(&long, &settings), Ok(()));
    }

    #[test]
    fn test_validation_is_idempotent() {
        for sig in ["a{sv}", "(a{", "a{vi}", ""] {
            assert_eq!(validate(sig), validate(sig));
        }
    }

    #[test]
    fn test_nul_byte_is_not_an_empty_signature() {
        // Rust strings carry their length; only "" is the empty signature.
        assert_eq!(validate(""), Ok(()));
        assert_eq!(
            validate(b"\0"),
            Err(GrammarError::UnknownTypeCode { code: 0, offset: 0 })
        );
        assert_eq!(
            validate(b"s\0"),
            Err(GrammarError::UnknownTypeCode { code: 0, offset: 1 })
        );
    }

    #[test]
    fn test_counts_complete_types() {
        assert_eq!(count_complete_types(b""), 0);
        assert_eq!(count_complete_types(b"a{sv}"), 1);
        assert_eq!(count_complete_types(b"ia{sv}(ii)v"), 4);
    }
}
