//! [`FieldWalker`] and the traits models implement to be walked.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque},
    time::{Duration, SystemTime},
};

use common::{token::looks_like_token, CryptoError, Direction, FieldTraversalError};
use tracing::debug;

/// Tag key marking a field for encryption.
pub const ENCRYPTED_TAG: &str = "encrypted";

/// The only tag value that puts a field in scope. Anything else leaves the
/// field untouched.
pub const ENCRYPTED_TAG_VALUE: &str = "true";

/// A value the walker can descend into.
///
/// Models implement this to list the fields the walker may write: tagged
/// values through [`FieldWalker::tagged`], everything else through
/// [`FieldWalker::nested`]. Leaf types (strings, numbers, maps) implement it
/// as a no-op, while `Option`, `Box`, `Vec`, slices and arrays forward to
/// their contents. A field of a type with no implementation is a compile
/// error rather than a silently skipped subtree. Usually generated by
/// [`encrypted_model!`](crate::encrypted_model), which leaves private fields
/// out of the list.
pub trait EncryptedFields {
    /// Visit every listed field in declaration order.
    ///
    /// # Errors
    ///
    /// Propagates the first transform failure. Fields visited before it keep
    /// their new values.
    fn walk_fields(&mut self, walker: &mut FieldWalker<'_>) -> Result<(), FieldTraversalError>;
}

/// A value that may sit behind an `encrypted` tag.
///
/// Only string-typed values are transformed. `Option` and `Box` forward to
/// their contents; every other type returns `None`, so tagging it compiles
/// and is a no-op.
pub trait FieldValue {
    /// The text to transform, if this value holds any.
    fn text_mut(&mut self) -> Option<&mut String> {
        None
    }
}

impl FieldValue for String {
    fn text_mut(&mut self) -> Option<&mut String> {
        Some(self)
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    fn text_mut(&mut self) -> Option<&mut String> {
        self.as_mut().and_then(|inner| inner.text_mut())
    }
}

impl<T: FieldValue + ?Sized> FieldValue for Box<T> {
    fn text_mut(&mut self) -> Option<&mut String> {
        (**self).text_mut()
    }
}

impl<T> FieldValue for Vec<T> {}
impl<T> FieldValue for VecDeque<T> {}
impl<T, const N: usize> FieldValue for [T; N] {}
impl<K, V, S> FieldValue for HashMap<K, V, S> {}
impl<K, V> FieldValue for BTreeMap<K, V> {}
impl<T, S> FieldValue for HashSet<T, S> {}
impl<T> FieldValue for BTreeSet<T> {}

/// Implement both traits as no-ops for types that never hold tagged fields.
macro_rules! leaf_fields {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FieldValue for $ty {}

            impl EncryptedFields for $ty {
                fn walk_fields(
                    &mut self,
                    _walker: &mut FieldWalker<'_>,
                ) -> Result<(), FieldTraversalError> {
                    Ok(())
                }
            }
        )*
    };
}

leaf_fields!(
    (), bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
    Duration, SystemTime,
);

/// Applies one transform to every in-scope field reachable from a root value.
///
/// The walker holds no state beyond the transform and a counter, so separate
/// walkers may run concurrently on disjoint values. Walking the same value from
/// two threads at once is up to the caller to prevent; `&mut` makes that a
/// compile error in safe code.
pub struct FieldWalker<'a> {
    direction: Direction,
    transform: &'a dyn Fn(&str) -> Result<String, CryptoError>,
    transformed: usize,
}

impl<'a> FieldWalker<'a> {
    /// Create a walker applying `transform` in `direction`.
    pub fn new(
        direction: Direction,
        transform: &'a dyn Fn(&str) -> Result<String, CryptoError>,
    ) -> Self {
        Self {
            direction,
            transform,
            transformed: 0,
        }
    }

    /// Direction this walker was built for.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Walk `root` and return how many field values changed.
    ///
    /// # Errors
    ///
    /// Returns the first [`FieldTraversalError`]; there is no rollback.
    pub fn walk<T: EncryptedFields + ?Sized>(
        &mut self,
        root: &mut T,
    ) -> Result<usize, FieldTraversalError> {
        let before = self.transformed;
        root.walk_fields(self)?;
        let changed = self.transformed - before;
        debug!(direction = %self.direction, fields = changed, "field traversal complete");
        Ok(changed)
    }

    /// Visit one tagged field.
    ///
    /// The transform runs only if `tag` is [`ENCRYPTED_TAG_VALUE`], `value` is
    /// string-typed and non-empty, and, for decrypt and rekey walks, `value`
    /// looks like a token.
    ///
    /// # Errors
    ///
    /// Wraps a transform failure with `field` and the walk direction.
    pub fn tagged<V: FieldValue + ?Sized>(
        &mut self,
        field: &'static str,
        tag: &str,
        value: &mut V,
    ) -> Result<(), FieldTraversalError> {
        if tag != ENCRYPTED_TAG_VALUE {
            return Ok(());
        }
        let Some(text) = value.text_mut() else {
            return Ok(());
        };
        if text.is_empty() {
            return Ok(());
        }
        let direction = self.direction;
        if direction.requires_token() && !looks_like_token(text.as_str()) {
            return Ok(());
        }
        let next = (self.transform)(text.as_str()).map_err(|source| FieldTraversalError {
            field,
            direction,
            source,
        })?;
        if next != *text {
            *text = next;
            self.transformed += 1;
        }
        Ok(())
    }

    /// Visit an untagged field: recurse into a related model, a pointer to one
    /// or a sequence of them. Leaf values are a no-op.
    ///
    /// # Errors
    ///
    /// Propagates the nested model's first failure unchanged.
    pub fn nested<T: EncryptedFields + ?Sized>(
        &mut self,
        value: &mut T,
    ) -> Result<(), FieldTraversalError> {
        value.walk_fields(self)
    }
}

/// Returns `true` if a field with visibility `vis` (as written in source) may
/// be written by the walker. Private fields are skipped.
#[doc(hidden)]
pub fn is_settable(vis: &str) -> bool {
    !vis.is_empty()
}

impl EncryptedFields for String {
    fn walk_fields(&mut self, _walker: &mut FieldWalker<'_>) -> Result<(), FieldTraversalError> {
        Ok(())
    }
}

impl<T: EncryptedFields + ?Sized> EncryptedFields for Box<T> {
    fn walk_fields(&mut self, walker: &mut FieldWalker<'_>) -> Result<(), FieldTraversalError> {
        (**self).walk_fields(walker)
    }
}

impl<T: EncryptedFields + ?Sized> EncryptedFields for &mut T {
    fn walk_fields(&mut self, walker: &mut FieldWalker<'_>) -> Result<(), FieldTraversalError> {
        (**self).walk_fields(walker)
    }
}

impl<T: EncryptedFields> EncryptedFields for Option<T> {
    fn walk_fields(&mut self, walker: &mut FieldWalker<'_>) -> Result<(), FieldTraversalError> {
        match self {
            Some(inner) => inner.walk_fields(walker),
            None => Ok(()),
        }
    }
}

impl<T: EncryptedFields> EncryptedFields for [T] {
    fn walk_fields(&mut self, walker: &mut FieldWalker<'_>) -> Result<(), FieldTraversalError> {
        for item in self.iter_mut() {
            item.walk_fields(walker)?;
        }
        Ok(())
    }
}

impl<T: EncryptedFields> EncryptedFields for Vec<T> {
    fn walk_fields(&mut self, walker: &mut FieldWalker<'_>) -> Result<(), FieldTraversalError> {
        self.as_mut_slice().walk_fields(walker)
    }
}

impl<T: EncryptedFields, const N: usize> EncryptedFields for [T; N] {
    fn walk_fields(&mut self, walker: &mut FieldWalker<'_>) -> Result<(), FieldTraversalError> {
        self.as_mut_slice().walk_fields(walker)
    }
}

impl<T: EncryptedFields> EncryptedFields for VecDeque<T> {
    fn walk_fields(&mut self, walker: &mut FieldWalker<'_>) -> Result<(), FieldTraversalError> {
        for item in self.iter_mut() {
            item.walk_fields(walker)?;
        }
        Ok(())
    }
}

// Maps and sets are leaves: their values are never walked.
impl<K, V, S> EncryptedFields for HashMap<K, V, S> {
    fn walk_fields(&mut self, _walker: &mut FieldWalker<'_>) -> Result<(), FieldTraversalError> {
        Ok(())
    }
}

impl<K, V> EncryptedFields for BTreeMap<K, V> {
    fn walk_fields(&mut self, _walker: &mut FieldWalker<'_>) -> Result<(), FieldTraversalError> {
        Ok(())
    }
}

impl<T, S> EncryptedFields for HashSet<T, S> {
    fn walk_fields(&mut self, _walker: &mut FieldWalker<'_>) -> Result<(), FieldTraversalError> {
        Ok(())
    }
}

impl<T> EncryptedFields for BTreeSet<T> {
    fn walk_fields(&mut self, _walker: &mut FieldWalker<'_>) -> Result<(), FieldTraversalError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Hand-written impl, the way a model without the macro plugs in.
    #[derive(Debug, Default)]
    struct Card {
        number: String,
        holder: String,
        expiry_month: u8,
    }

    impl EncryptedFields for Card {
        fn walk_fields(
            &mut self,
            walker: &mut FieldWalker<'_>,
        ) -> Result<(), FieldTraversalError> {
            walker.tagged("number", ENCRYPTED_TAG_VALUE, &mut self.number)?;
            walker.tagged("expiry_month", ENCRYPTED_TAG_VALUE, &mut self.expiry_month)?;
            Ok(())
        }
    }

    fn seal(s: &str) -> Result<String, CryptoError> {
        Ok(format!("k|{s}|x"))
    }

    fn unseal(s: &str) -> Result<String, CryptoError> {
        s.strip_prefix("k|")
            .and_then(|rest| rest.strip_suffix("|x"))
            .map(str::to_owned)
            .ok_or(CryptoError::MalformedToken("test"))
    }

    fn card(number: &str) -> Card {
        Card {
            number: number.into(),
            holder: "Alice".into(),
            expiry_month: 12,
        }
    }

    #[test]
    fn encrypts_tagged_string_only() {
        let mut c = card("4111");
        let n = FieldWalker::new(Direction::Encrypt, &seal).walk(&mut c).unwrap();
        assert_eq!(n, 1);
        assert_eq!(c.number, "k|4111|x");
        assert_eq!(c.holder, "Alice");
        assert_eq!(c.expiry_month, 12);
    }

    #[test]
    fn decrypt_skips_values_without_separator() {
        let mut c = card("legacy plaintext");
        let n = FieldWalker::new(Direction::Decrypt, &unseal).walk(&mut c).unwrap();
        assert_eq!(n, 0);
        assert_eq!(c.number, "legacy plaintext");
    }

    #[test]
    fn encrypt_does_not_apply_the_token_guard() {
        let mut c = card("already|has|pipes");
        FieldWalker::new(Direction::Encrypt, &seal).walk(&mut c).unwrap();
        assert_eq!(c.number, "k|already|has|pipes|x");
    }

    #[test]
    fn empty_values_are_not_transformed() {
        let calls = std::cell::Cell::new(0);
        let counting = |s: &str| {
            calls.set(calls.get() + 1);
            seal(s)
        };
        let mut c = card("");
        FieldWalker::new(Direction::Encrypt, &counting).walk(&mut c).unwrap();
        assert_eq!(calls.get(), 0);
        assert_eq!(c.number, "");
    }

    #[test]
    fn other_tag_values_are_ignored() {
        let mut s = String::from("x");
        let mut w = FieldWalker::new(Direction::Encrypt, &seal);
        w.tagged("s", "false", &mut s).unwrap();
        w.tagged("s", "TRUE", &mut s).unwrap();
        w.tagged("s", "", &mut s).unwrap();
        assert_eq!(s, "x");
    }

    #[test]
    fn option_string_is_transformed_when_present() {
        let mut some = Some(String::from("x"));
        let mut none: Option<String> = None;
        let mut w = FieldWalker::new(Direction::Encrypt, &seal);
        w.tagged("some", ENCRYPTED_TAG_VALUE, &mut some).unwrap();
        w.tagged("none", ENCRYPTED_TAG_VALUE, &mut none).unwrap();
        assert_eq!(some.as_deref(), Some("k|x|x"));
        assert!(none.is_none());
    }

    #[test]
    fn roots_may_be_sequences_and_pointers() {
        let mut cards = vec![card("1"), card("2")];
        assert_eq!(
            FieldWalker::new(Direction::Encrypt, &seal).walk(&mut cards).unwrap(),
            2
        );

        let mut boxed: Option<Box<Card>> = Some(Box::new(card("3")));
        FieldWalker::new(Direction::Encrypt, &seal).walk(&mut boxed).unwrap();
        assert_eq!(boxed.unwrap().number, "k|3|x");

        let mut absent: Option<Card> = None;
        assert_eq!(
            FieldWalker::new(Direction::Encrypt, &seal).walk(&mut absent).unwrap(),
            0
        );

        let mut array = [card("4"), card("5")];
        FieldWalker::new(Direction::Encrypt, &seal)
            .walk(&mut array[..])
            .unwrap();
        assert_eq!(array[1].number, "k|5|x");

        let mut ptrs: Vec<Box<Card>> = vec![Box::new(card("6"))];
        FieldWalker::new(Direction::Encrypt, &seal).walk(&mut ptrs).unwrap();
        assert_eq!(ptrs[0].number, "k|6|x");
    }

    #[test]
    fn failure_is_wrapped_with_field_name() {
        let fail = |_: &str| -> Result<String, CryptoError> { Err(CryptoError::DecryptionFailed) };
        let mut c = card("k|1|x");
        let err = FieldWalker::new(Direction::Decrypt, &fail)
            .walk(&mut c)
            .unwrap_err();
        assert_eq!(err.field, "number");
        assert_eq!(err.direction, Direction::Decrypt);
        assert_eq!(err.source, CryptoError::DecryptionFailed);
    }

    #[test]
    fn sequence_failure_leaves_earlier_elements_transformed() {
        let picky = |s: &str| {
            if s == "bad" {
                Err(CryptoError::EncryptionFailed)
            } else {
                seal(s)
            }
        };
        let mut cards = vec![card("1"), card("bad"), card("3")];
        assert!(FieldWalker::new(Direction::Encrypt, &picky)
            .walk(&mut cards)
            .is_err());
        assert_eq!(cards[0].number, "k|1|x");
        assert_eq!(cards[1].number, "bad");
        assert_eq!(cards[2].number, "3");
    }

    #[test]
    fn settable_is_any_visibility() {
        assert!(is_settable("pub"));
        assert!(is_settable("pub(crate)"));
        assert!(!is_settable(""));
    }
}
