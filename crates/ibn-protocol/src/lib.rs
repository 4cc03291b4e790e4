//! Shared data model for the intent pipeline.
//!
//! Every stage (normalizer, discovery, mapper, generator, commit engine,
//! HTTP API) exchanges these types, so they live in one dependency-light
//! crate that everything else builds on.

pub mod device;
pub mod discovery;
pub mod intent;
pub mod payload;
pub mod response;
pub mod results;
pub mod risk;

pub use device::*;
pub use discovery::*;
pub use intent::*;
pub use payload::*;
pub use response::*;
pub use results::*;
pub use risk::*;
