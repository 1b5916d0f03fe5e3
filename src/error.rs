//! Errors returned by `morel`.
use thiserror::Error;

/// An error indicating that a [`LockRegistry`] cannot be constructed for a
/// key type.
///
/// A registry holds its keys weakly, so that an entry is reclaimed once
/// nothing else references its key. Keys of primitive or standard library
/// types defeat this: values like these are freely copied, interned in
/// statics, and kept alive by code outside of the caller's control, so the
/// registry's entries would never be reclaimed. The registry therefore
/// rejects such key types when it is constructed, rather than on first use.
///
/// [`LockRegistry`]: crate::LockRegistry
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum KeyTypeError {
    /// The key type is a primitive or built-in compound type, such as an
    /// integer, `str`, a reference, a tuple, or an array.
    #[error("key type `{type_name}` must not be a primitive type")]
    Primitive {
        /// The name of the rejected key type.
        type_name: &'static str,
    },

    /// The key type is defined in the Rust standard library.
    #[error("key type `{type_name}` must be defined outside of the `{krate}` crate")]
    CoreLibrary {
        /// The name of the rejected key type.
        type_name: &'static str,
        /// The standard library crate the key type is defined in.
        krate: &'static str,
    },
}

impl KeyTypeError {
    /// Returns the name of the rejected key type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Primitive { type_name } => *type_name,
            Self::CoreLibrary { type_name, .. } => *type_name,
        }
    }
}
