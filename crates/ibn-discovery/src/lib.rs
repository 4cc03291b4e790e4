//! YANG model discovery.
//!
//! For every inventory device, find out which YANG modules it supports:
//! ask the device itself (NETCONF hello, gNMI capabilities, RESTCONF YANG
//! library) and fall back to public schema repositories through an on-disk
//! cache when live probing is disabled or fails.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod repository;
pub mod requirements;

pub use cache::{ModelCache, YangModel};
pub use config::DiscoveryConfig;
pub use engine::ModelDiscovery;
pub use error::{DiscoveryError, DiscoveryResult};
pub use repository::{
    FetchedSchema, HttpSchemaRepository, InMemorySchemaRepository, RepositoryConfig,
    RepositoryUrl, SchemaRepository,
};
pub use requirements::required_models;
