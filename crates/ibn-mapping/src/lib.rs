//! Intent to device configuration.
//!
//! [`paths`] maps a normalized intent onto the YANG paths each vendor uses
//! for the service; [`generator`] renders one transport-specific payload per
//! device using the strategy table in [`templates`].

pub mod error;
pub mod generator;
pub mod paths;
pub mod templates;

pub use error::{RenderError, RenderResult};
pub use generator::{generate, post_validation, prechecks};
pub use paths::{create_mappings, map_paths, suggest_alternatives, validate_yang_path};
pub use templates::{RenderContext, render};
