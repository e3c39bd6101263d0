use std::iter::FusedIterator;

use crate::err::GrammarResult;
use crate::scanner::{ScanContext, Span, TypeCursor};
use crate::settings::SignatureSettings;
use crate::type_code::TypeCode;
use crate::validator::validate_with;

/// One single complete type borrowed from a signature string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompleteTypeRef<'a> {
    text: &'a str,
    offset: usize,
    code: TypeCode,
    last: bool,
}

impl<'a> CompleteTypeRef<'a> {
    pub fn as_str(&self) -> &'a str {
        self.text
    }

    /// Offset of this type within the string it was scanned from.
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn type_code(&self) -> TypeCode {
        self.code
    }

    /// `true` when this type ends at the end of the scanned string.
    pub fn is_last(&self) -> bool {
        self.last
    }

    /// Iterates one level down into a container.
    ///
    /// An array yields its element type, a struct its fields and a dict-entry its key and
    /// value. Basic types and variants yield nothing.
    pub fn children(&self) -> CompleteTypes<'a> {
        children_of(self.text, self.code)
    }
}

/// Iterator over the single complete types of a validated signature string.
///
/// Not restartable: once it returns `None` it keeps returning `None`.
#[derive(Debug, Clone)]
pub struct CompleteTypes<'a> {
    text: &'a str,
    cursor: TypeCursor,
}

impl<'a> CompleteTypes<'a> {
    /// Validates `signature` with the default limits and iterates it.
    pub fn new(signature: &'a str) -> GrammarResult<Self> {
        CompleteTypes::with_settings(signature, &SignatureSettings::default())
    }

    pub fn with_settings(signature: &'a str, settings: &SignatureSettings) -> GrammarResult<Self> {
        validate_with(signature, settings)?;
        Ok(CompleteTypes::from_validated(signature, ScanContext::TopLevel))
    }

    pub(crate) fn from_validated(text: &'a str, context: ScanContext) -> Self {
        CompleteTypes {
            text,
            cursor: TypeCursor::new(context),
        }
    }

    pub(crate) fn empty() -> Self {
        CompleteTypes {
            text: "",
            cursor: TypeCursor::exhausted(),
        }
    }
}

impl<'a> Iterator for CompleteTypes<'a> {
    type Item = CompleteTypeRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let Span { start, end, code } = self.cursor.step(self.text.as_bytes())?;
        Some(CompleteTypeRef {
            text: self.text.get(start..end)?,
            offset: start,
            code,
            last: self.cursor.is_exhausted(),
        })
    }
}

impl FusedIterator for CompleteTypes<'_> {}

/// Interior of a validated container type, scanned with the context its parent gives it.
pub(crate) fn children_of(text: &str, code: TypeCode) -> CompleteTypes<'_> {
    let interior = match code {
        TypeCode::Array => text.get(1..).map(|t| (t, ScanContext::ArrayElement)),
        TypeCode::Struct | TypeCode::DictEntry => text
            .get(1..text.len().saturating_sub(1))
            .map(|t| (t, ScanContext::TopLevel)),
        _ => None,
    };

    match interior {
        Some((interior, context)) => CompleteTypes::from_validated(interior, context),
        None => CompleteTypes::empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::err::GrammarError;
    use pretty_assertions::assert_eq;

    fn split(sig: &str) -> Vec<&str> {
        CompleteTypes::new(sig)
            .unwrap()
            .map(|t| t.as_str())
            .collect()
    }

    #[test]
    fn test_splits_into_single_complete_types() {
        assert_eq!(split("ia{sv}(ii)v"), vec!["i", "a{sv}", "(ii)", "v"]);
        assert_eq!(split("a{sv}"), vec!["a{sv}"]);
        assert_eq!(split("aaiaas"), vec!["aai", "aas"]);
        assert!(split("").is_empty());
    }

    #[test]
    fn test_reports_offsets_and_last_item() {
        let items: Vec<(usize, bool)> = CompleteTypes::new("s(ub)o")
            .unwrap()
            .map(|t| (t.offset(), t.is_last()))
            .collect();

        assert_eq!(items, vec![(0, false), (1, false), (5, true)]);
    }

    #[test]
    fn test_construction_rejects_invalid_signatures() {
        assert_eq!(
            CompleteTypes::new("a{vs}").unwrap_err(),
            GrammarError::InvalidDictKeyType { offset: 2 }
        );
    }

    #[test]
    fn test_children_descend_one_level() {
        let outer: Vec<CompleteTypeRef<'_>> = CompleteTypes::new("(ii)a{sv}aas").unwrap().collect();

        let fields: Vec<&str> = outer[0].children().map(|t| t.as_str()).collect();
        assert_eq!(fields, vec!["i", "i"]);

        let element: Vec<&str> = outer[1].children().map(|t| t.as_str()).collect();
        assert_eq!(element, vec!["{sv}"]);

        let entry = outer[1].children().next().unwrap();
        assert_eq!(entry.type_code(), TypeCode::DictEntry);
        let key_value: Vec<&str> = entry.children().map(|t| t.as_str()).collect();
        assert_eq!(key_value, vec!["s", "v"]);

        let inner: Vec<&str> = outer[2].children().map(|t| t.as_str()).collect();
        assert_eq!(inner, vec!["as"]);
    }

    #[test]
    fn test_basic_types_have_no_children() {
        let first = CompleteTypes::new("v").unwrap().next().unwrap();
        assert_eq!(first.children().count(), 0);
    }

    #[test]
    fn test_independent_iterators_over_one_string() {
        let sig = "a{sv}(ii)";
        let mut a = CompleteTypes::new(sig).unwrap();
        let b = CompleteTypes::new(sig).unwrap();

        assert_eq!(a.by_ref().count(), 2);
        assert_eq!(a.next(), None);
        assert_eq!(b.map(|t| t.as_str()).collect::<Vec<_>>(), vec!["a{sv}", "(ii)"]);
    }
}
