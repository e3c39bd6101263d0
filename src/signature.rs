use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::FusedIterator;
use std::ops::Range;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::complete_types::{CompleteTypeRef, CompleteTypes, children_of};
use crate::err::{GrammarError, Result, SignatureError};
use crate::scanner::{ScanContext, Span, TypeCursor};
use crate::settings::SignatureSettings;
use crate::type_code::TypeCode;
use crate::validator::{count_complete_types, validate_with};

/// A validated D-Bus signature.
///
/// The text is immutable and shared: clones and iterators hold a counted reference to the same
/// buffer. `variant_level` records how many nested variants the value was found in (a signature
/// inside a variant inside a variant has level 2). Equality and hashing look at the text only.
#[derive(Debug, Clone)]
pub struct Signature {
    text: Arc<str>,
    variant_level: u32,
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Signature {}

impl Hash for Signature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl Signature {
    /// Validates `signature` with the default limits.
    pub fn new(signature: impl AsRef<str>) -> Result<Self> {
        Signature::with_settings(signature, &SignatureSettings::default())
    }

    pub fn with_settings(signature: impl AsRef<str>, settings: &SignatureSettings) -> Result<Self> {
        let signature = signature.as_ref();
        validate_with(signature, settings)?;
        Ok(Signature::from_validated(Arc::from(signature)))
    }

    fn from_validated(text: Arc<str>) -> Self {
        Signature {
            text,
            variant_level: 0,
        }
    }

    /// The empty signature, describing zero types.
    pub fn empty() -> Self {
        Signature::from_validated(Arc::from(""))
    }

    #[must_use]
    pub fn with_variant_level(mut self, variant_level: u32) -> Self {
        self.variant_level = variant_level;
        self
    }

    pub fn variant_level(&self) -> u32 {
        self.variant_level
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Iterates the single complete types, sharing this signature's buffer.
    pub fn iter(&self) -> SignatureIter {
        SignatureIter::new(Arc::clone(&self.text))
    }

    /// Iterates the single complete types as borrowed slices.
    pub fn complete_types(&self) -> CompleteTypes<'_> {
        CompleteTypes::from_validated(&self.text, ScanContext::TopLevel)
    }

    pub fn single_complete_type_count(&self) -> usize {
        count_complete_types(self.text.as_bytes())
    }

    pub fn is_single_complete_type(&self) -> bool {
        self.single_complete_type_count() == 1
    }

    /// Signature of an array whose elements have type `element`.
    pub fn array_of(element: &Signature) -> Result<Signature> {
        expect_single(element)?;
        Signature::new(format!("a{element}"))
    }

    /// Signature of a dictionary (an array of dict-entries) mapping `key` to `value`.
    pub fn dict_of(key: &Signature, value: &Signature) -> Result<Signature> {
        expect_single(key)?;
        expect_single(value)?;
        Signature::new(format!("a{{{key}{value}}}"))
    }

    /// Signature of a struct whose fields are the concatenation of `fields`.
    pub fn struct_of<'s>(fields: impl IntoIterator<Item = &'s Signature>) -> Result<Signature> {
        let mut text = String::from("(");
        for field in fields {
            text.push_str(field.as_str());
        }
        if text.len() == 1 {
            return Err(GrammarError::EmptyStruct { offset: 1 }.into());
        }
        text.push(')');
        Signature::new(text)
    }
}

fn expect_single(signature: &Signature) -> Result<()> {
    match signature.single_complete_type_count() {
        1 => Ok(()),
        found => Err(SignatureError::NotSingleCompleteType { found }),
    }
}

impl Default for Signature {
    fn default() -> Self {
        Signature::empty()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl AsRef<str> for Signature {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

impl FromStr for Signature {
    type Err = SignatureError;

    fn from_str(s: &str) -> Result<Self> {
        Signature::new(s)
    }
}

impl TryFrom<&str> for Signature {
    type Error = SignatureError;

    fn try_from(value: &str) -> Result<Self> {
        Signature::new(value)
    }
}

impl TryFrom<String> for Signature {
    type Error = SignatureError;

    fn try_from(value: String) -> Result<Self> {
        validate_with(&value, &SignatureSettings::default())?;
        Ok(Signature::from_validated(Arc::from(value)))
    }
}

impl<'a> IntoIterator for &'a Signature {
    type Item = CompleteTypeRef<'a>;
    type IntoIter = CompleteTypes<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.complete_types()
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

struct SignatureVisitor;

impl Visitor<'_> for SignatureVisitor {
    type Value = Signature;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a valid D-Bus type signature")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Signature, E> {
        Signature::new(v).map_err(E::custom)
    }
}

/// Deserialization validates with the default [`SignatureSettings`], so a signature longer than
/// [`MAX_SIGNATURE_LENGTH`](crate::MAX_SIGNATURE_LENGTH) that was built with the length limit
/// lifted serializes but does not deserialize back. The variant level is not serialized.
impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_str(SignatureVisitor)
    }
}

/// One single complete type yielded by [`SignatureIter`].
///
/// Holds a counted reference to the buffer it was scanned from, so it outlives the iterator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleCompleteType {
    source: Arc<str>,
    range: Range<usize>,
    code: TypeCode,
    last: bool,
}

impl SingleCompleteType {
    pub fn as_str(&self) -> &str {
        self.source.get(self.range.clone()).unwrap_or_default()
    }

    pub fn offset(&self) -> usize {
        self.range.start
    }

    pub fn type_code(&self) -> TypeCode {
        self.code
    }

    /// `true` when this is the final type of the signature.
    pub fn is_last(&self) -> bool {
        self.last
    }

    /// Iterates one level down into a container; see [`CompleteTypeRef::children`].
    pub fn children(&self) -> CompleteTypes<'_> {
        children_of(self.as_str(), self.code)
    }

    /// Copies this type into an independent [`Signature`].
    ///
    /// The copy does not share the source buffer. Running out of memory is reported as
    /// [`SignatureError::AllocationFailed`].
    pub fn to_signature(&self) -> Result<Signature> {
        let text = self.as_str();
        let mut owned = String::new();
        owned
            .try_reserve_exact(text.len())
            .map_err(|source| SignatureError::AllocationFailed {
                len: text.len(),
                source,
            })?;
        owned.push_str(text);
        Ok(Signature::from_validated(Arc::from(owned)))
    }
}

impl fmt::Display for SingleCompleteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lazily yields the single complete types of a [`Signature`], left to right.
///
/// Finite and not restartable; build a new one with [`Signature::iter`] to scan again.
#[derive(Debug, Clone)]
pub struct SignatureIter {
    source: Arc<str>,
    cursor: TypeCursor,
}

impl SignatureIter {
    fn new(source: Arc<str>) -> Self {
        // The empty signature yields nothing and never touches the scanner.
        let cursor = if source.is_empty() {
            TypeCursor::exhausted()
        } else {
            TypeCursor::new(ScanContext::TopLevel)
        };
        SignatureIter { source, cursor }
    }
}

impl Iterator for SignatureIter {
    type Item = SingleCompleteType;

    fn next(&mut self) -> Option<Self::Item> {
        let Span { start, end, code } = self.cursor.step(self.source.as_bytes())?;
        Some(SingleCompleteType {
            source: Arc::clone(&self.source),
            range: start..end,
            code,
            last: self.cursor.is_exhausted(),
        })
    }
}

impl FusedIterator for SignatureIter {}

impl IntoIterator for Signature {
    type Item = SingleCompleteType;
    type IntoIter = SignatureIter;

    fn into_iter(self) -> Self::IntoIter {
        SignatureIter::new(self.text)
    }
}
