#![doc = include_str!("../README.md")]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs, missing_debug_implementations)]

#[macro_use]
pub(crate) mod util;
pub(crate) mod loom;

pub mod error;
pub mod raw;
pub mod registry;
pub mod scope;

#[doc(inline)]
pub use self::{
    error::KeyTypeError,
    raw::{DefaultRawRwLock, RawRwLock},
    registry::{KeyType, LockRegistry},
    scope::{Downgrader, RwScope},
};
