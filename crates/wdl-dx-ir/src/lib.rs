//! Typed intermediate representation of WDL values for DNAnexus execution.
//!
//! The types and values in this crate are shared by the translation of a
//! workflow's inputs and by the runtime of a job executing on the platform.
//! Both are immutable once constructed.

mod file;
mod types;
mod value;

pub use file::*;
pub use types::*;
pub use value::*;
