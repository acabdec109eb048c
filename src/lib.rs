//! Safe Rust bindings to the IQ-TREE maximum likelihood phylogenetics library.
//!
//! The engine itself is an external shared library that is loaded at run time.
//! This crate moves inputs into the engine through read-only array views,
//! turns every result envelope it returns into a host value or an error, and
//! releases every engine-owned buffer exactly once.
use anyhow::Error;

pub mod alignment;
pub mod distribution;
pub mod engine;
pub mod envelope;
pub mod errors;
pub mod ffi;
pub mod host;
pub mod iqtree;
pub mod model;
pub mod tree;

pub use engine::{Engine, EngineConfig};
pub use errors::{IqTreeError, LibraryError, ParseIqTreeError, ProtocolError, ValidationError};

type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
pub(crate) fn downcast_error<T>(result: &Result<impl Sized>) -> &T
where
    T: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
{
    result.as_ref().err().unwrap().downcast_ref::<T>().unwrap()
}
