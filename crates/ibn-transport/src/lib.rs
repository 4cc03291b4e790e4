//! Device management transports.
//!
//! The controller never talks to a wire protocol directly. It goes through
//! three session traits ([`NetconfSession`], [`GnmiSession`],
//! [`RestconfSession`]) opened per device by a [`DeviceConnector`]. This
//! crate provides the traits, NETCONF RPC document helpers, gNMI path
//! helpers, a reqwest-based RESTCONF client and a scriptable mock fleet for
//! tests.

pub mod cancel;
pub mod config;
pub mod connector;
pub mod error;
pub mod gnmi;
pub mod mock;
pub mod netconf;
pub mod restconf;

pub use cancel::Cancellation;
pub use config::TransportConfig;
pub use connector::{DeviceConnector, LiveConnector};
pub use error::{TransportError, TransportResult, with_timeout};
pub use gnmi::{GnmiCapabilities, GnmiModel, GnmiPath, GnmiSession, GnmiUpdate, SetRequest};
pub use mock::{MockConnector, MockDevice, MockOp};
pub use netconf::{Datastore, DefaultOperation, NetconfSession};
pub use restconf::{HttpRestconfClient, RestconfSession};
