//! Endpoint url codec for NodePass controllers.
//!
//! Controllers create tunnel instances from a single url such as
//! `server://key@0.0.0.0:10101/127.0.0.1:8000?log=info&tls=1`. This crate
//! parses those urls, builds them back from operator input, and derives the
//! addresses of a client paired with a newly created server.

pub mod address;
pub mod config;
pub mod endpoint;
pub mod instance;
pub mod pairing;
pub mod store;
pub mod validation;

pub use config::{ControllerConfig, ControllerRegistry};
pub use endpoint::{
    BuildError, ClientEndpoint, EndpointDescriptor, EndpointForm, LogLevel, Role, ServerEndpoint, TlsMode, TlsSettings,
    build_descriptor, build_url, parse,
};
pub use pairing::{PairRequest, build_pair_urls, derive_pair_addresses};
