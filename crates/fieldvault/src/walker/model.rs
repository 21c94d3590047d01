//! The `encrypted_model!` declaration macro.

/// Declare a struct together with its [`EncryptedFields`](crate::walker::EncryptedFields)
/// implementation.
///
/// Every public field is visited. A field annotated `[encrypted = "true"]` is
/// encrypted before writes and decrypted after reads when it holds a string;
/// on any other type the tag is a no-op. Every other field is walked, so a
/// related model, an `Option`/`Box` of one or a `Vec` of them has its own
/// tagged fields handled without further annotation.
///
/// Annotations follow the field type in square brackets:
///
/// - `[encrypted = "true"]`: in scope. Any other value counts as untagged.
/// - `[opaque]`: never visited. Needed for field types from other crates that
///   do not implement [`EncryptedFields`](crate::walker::EncryptedFields).
/// - `[nested]` or any other `[key = "value"]`: untagged.
///
/// Fields declared without a visibility qualifier are private and are never
/// touched, whatever their annotation.
///
/// ```
/// use fieldvault::encrypted_model;
///
/// encrypted_model! {
///     #[derive(Debug, Clone, Default)]
///     pub struct Customer {
///         pub id: i64,
///         pub email: String [encrypted = "true"],
///         pub orders: Vec<Order>,
///     }
/// }
///
/// encrypted_model! {
///     #[derive(Debug, Clone, Default)]
///     pub struct Order {
///         pub card_number: String [encrypted = "true"],
///     }
/// }
/// ```
#[macro_export]
macro_rules! encrypted_model {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty $([$($tag:tt)+])?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        impl $crate::walker::EncryptedFields for $name {
            #[allow(unused_variables)]
            fn walk_fields(
                &mut self,
                walker: &mut $crate::walker::FieldWalker<'_>,
            ) -> ::core::result::Result<(), $crate::FieldTraversalError> {
                $(
                    $crate::__encrypted_field!(walker, self, [$field_vis] $field $(, $($tag)+)?);
                )*
                ::core::result::Result::Ok(())
            }
        }

        impl $crate::walker::FieldValue for $name {}
    };
}

#[doc(hidden)]
#[macro_export]
macro_rules! __encrypted_field {
    ($walker:ident, $this:ident, [$field_vis:vis] $field:ident, opaque) => {};
    ($walker:ident, $this:ident, [$field_vis:vis] $field:ident, encrypted = $tag:literal) => {
        if $crate::walker::is_settable(stringify!($field_vis)) {
            if $tag == $crate::walker::ENCRYPTED_TAG_VALUE {
                $walker.tagged(stringify!($field), $tag, &mut $this.$field)?;
            } else {
                $walker.nested(&mut $this.$field)?;
            }
        }
    };
    ($walker:ident, $this:ident, [$field_vis:vis] $field:ident $(, $($tag:tt)+)?) => {
        if $crate::walker::is_settable(stringify!($field_vis)) {
            $walker.nested(&mut $this.$field)?;
        }
    };
}
