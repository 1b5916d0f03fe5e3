use crate::error::KeyTypeError;
use core::{any, fmt};

/// Describes the type of key used by a [`LockRegistry`].
///
/// A `KeyType` is used to decide, when a registry is constructed, whether a
/// key type is *admissible*: whether values of that type are likely to be
/// dropped once the caller is done with them. See [`KeyTypeError`] for why
/// some key types are rejected.
///
/// # Examples
///
/// ```
/// use morel::{KeyType, KeyTypeError};
///
/// struct Account {
///     id: u64,
/// }
///
/// assert!(KeyType::of::<Account>().check().is_ok());
///
/// assert!(matches!(
///     KeyType::of::<u64>().check(),
///     Err(KeyTypeError::Primitive { .. })
/// ));
/// assert!(matches!(
///     KeyType::of::<String>().check(),
///     Err(KeyTypeError::CoreLibrary { krate: "alloc", .. })
/// ));
/// ```
///
/// [`LockRegistry`]: crate::LockRegistry
#[derive(Copy, Clone, Eq, PartialEq, Hash)]
pub struct KeyType {
    name: &'static str,
}

/// Names of the primitive types, as reported by [`core::any::type_name`].
const PRIMITIVES: &[&str] = &[
    "bool", "char", "str", "u8", "u16", "u32", "u64", "u128", "usize", "i8", "i16", "i32", "i64",
    "i128", "isize", "f16", "f32", "f64", "f128", "()", "!",
];

/// Crates which make up the standard library.
const CORE_CRATES: &[&str] = &["core", "alloc", "std"];

impl KeyType {
    /// Returns the `KeyType` describing `K`.
    #[must_use]
    pub fn of<K: ?Sized>() -> Self {
        Self {
            name: any::type_name::<K>(),
        }
    }

    /// Returns the name of this key type.
    ///
    /// This is the name returned by [`core::any::type_name`], and is intended
    /// for diagnostics only.
    #[inline]
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Checks whether this key type may be used as the key of a
    /// [`LockRegistry`](crate::LockRegistry).
    ///
    /// # Errors
    ///
    /// - [`KeyTypeError::Primitive`] if this is a primitive type, or a
    ///   built-in compound type (a reference, pointer, tuple, array, slice, or
    ///   function pointer).
    /// - [`KeyTypeError::CoreLibrary`] if this type is defined in the `core`,
    ///   `alloc`, or `std` crates.
    pub fn check(&self) -> Result<(), KeyTypeError> {
        let type_name = self.name;
        let path = type_name.strip_prefix("dyn ").unwrap_or(type_name);

        if PRIMITIVES.contains(&path) || is_builtin_compound(path) {
            return Err(KeyTypeError::Primitive { type_name });
        }

        let krate = path.split("::").next().unwrap_or(path);
        if path.len() > krate.len() && CORE_CRATES.contains(&krate) {
            return Err(KeyTypeError::CoreLibrary { type_name, krate });
        }

        Ok(())
    }
}

impl fmt::Debug for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KeyType").field(&self.name).finish()
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name)
    }
}

fn is_builtin_compound(path: &str) -> bool {
    path.starts_with(['&', '*', '(', '['])
        || path.starts_with("fn(")
        || path.starts_with("unsafe ")
        || path.starts_with("extern ")
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::{collections::HashMap, path::PathBuf, sync::Arc};

    struct UserKey;

    #[allow(dead_code)]
    struct Generic<T>(T);

    trait UserTrait {}

    #[test]
    fn accepts_user_types() {
        assert_eq!(KeyType::of::<UserKey>().check(), Ok(()));
        assert_eq!(KeyType::of::<Generic<u32>>().check(), Ok(()));
        assert_eq!(KeyType::of::<Generic<String>>().check(), Ok(()));
        assert_eq!(KeyType::of::<dyn UserTrait>().check(), Ok(()));
    }

    #[test]
    fn rejects_primitives() {
        for key_type in [
            KeyType::of::<u8>(),
            KeyType::of::<i64>(),
            KeyType::of::<usize>(),
            KeyType::of::<f64>(),
            KeyType::of::<bool>(),
            KeyType::of::<char>(),
            KeyType::of::<str>(),
            KeyType::of::<()>(),
        ] {
            assert_eq!(
                key_type.check(),
                Err(KeyTypeError::Primitive {
                    type_name: key_type.name()
                }),
                "{key_type} must be rejected"
            );
        }
    }

    #[test]
    fn rejects_builtin_compound_types() {
        for key_type in [
            KeyType::of::<&'static UserKey>(),
            KeyType::of::<*const UserKey>(),
            KeyType::of::<(UserKey, UserKey)>(),
            KeyType::of::<[UserKey; 4]>(),
            KeyType::of::<[UserKey]>(),
            KeyType::of::<fn(UserKey)>(),
        ] {
            assert!(
                matches!(key_type.check(), Err(KeyTypeError::Primitive { .. })),
                "{key_type} must be rejected"
            );
        }
    }

    #[test]
    fn rejects_core_library_types() {
        for (key_type, expected) in [
            (KeyType::of::<String>(), "alloc"),
            (KeyType::of::<Vec<UserKey>>(), "alloc"),
            (KeyType::of::<Arc<UserKey>>(), "alloc"),
            (KeyType::of::<Option<UserKey>>(), "core"),
            (KeyType::of::<core::time::Duration>(), "core"),
            (KeyType::of::<dyn core::any::Any>(), "core"),
            (KeyType::of::<PathBuf>(), "std"),
            (KeyType::of::<HashMap<UserKey, UserKey>>(), "std"),
        ] {
            match key_type.check() {
                Err(KeyTypeError::CoreLibrary { type_name, krate }) => {
                    assert_eq!(type_name, key_type.name());
                    assert_eq!(krate, expected, "{key_type} is defined in `{expected}`");
                }
                res => panic!("{key_type} must be rejected as a core library type, got {res:?}"),
            }
        }
    }

    fn check_name(name: String) -> Result<(), KeyTypeError> {
        KeyType {
            name: Box::leak(name.into_boxed_str()),
        }
        .check()
    }

    proptest! {
        #[test]
        fn std_paths_are_rejected(
            krate in prop::sample::select(CORE_CRATES),
            path in "[a-z_]{1,8}(::[a-z_]{1,8}){0,3}::[A-Z][A-Za-z0-9]{0,12}",
        ) {
            let result = check_name(format!("{krate}::{path}"));
            let is_core_library = matches!(result, Err(KeyTypeError::CoreLibrary { krate: k, .. }) if k == krate);
            prop_assert!(is_core_library);
        }

        #[test]
        fn user_paths_are_accepted(
            krate in "[a-z][a-z0-9_]{0,12}",
            path in "([a-z_]{1,8}::){0,3}[A-Z][A-Za-z0-9]{0,12}",
        ) {
            prop_assume!(!CORE_CRATES.contains(&krate.as_str()));
            prop_assert_eq!(check_name(format!("{krate}::{path}")), Ok(()));
        }

        #[test]
        fn references_are_rejected(inner in "[a-z]{1,8}::[A-Z][a-z]{0,8}") {
            let is_primitive = matches!(check_name(format!("&{inner}")), Err(KeyTypeError::Primitive { .. }));
            prop_assert!(is_primitive);
        }
    }
}
