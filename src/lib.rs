//! Job input/output serialization and cross-job linking for running WDL on
//! DNAnexus.
//!
//! This crate sits at the boundary between the typed values of
//! [`wdl_dx_ir`] and the flat JSON fields the platform exchanges with jobs:
//!
//! * [`ParameterLinkSerializer`] and [`ParameterLinkDeserializer`] convert
//!   values to and from wire fields, including deferred references to the
//!   outputs of executions that have not run yet.
//! * [`BulkFileResolver`] resolves every file mentioned by a set of inputs
//!   with one batched resolve call and one batched describe call.
//! * [`InputTranslator`] maps a user's input document onto workflow stages,
//!   using an [`ExactlyOnce`] tracker to reject unmapped inputs.
//! * [`JobMetaContext`] exposes the metadata of an executing job and writes
//!   its output or error artifact.

mod bundle;
mod client;
pub mod codec;
pub mod config;
mod error;
mod exactly_once;
mod extract;
mod inputs;
pub mod job;
mod link;
mod resolver;

pub use bundle::*;
pub use client::*;
pub use error::*;
pub use exactly_once::*;
pub use extract::*;
pub use inputs::*;
pub use job::JobMetaContext;
pub use job::JobMetadataSource;
pub use link::*;
pub use resolver::*;
pub use wdl_dx_ir::JsonMap;
