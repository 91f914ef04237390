//! Service layer module root.
//! Algorithm translation, the remote signing context and the RFC 3161
//! protocol pieces.

pub mod algorithm;
pub mod signing_context;
pub mod timestamp;
pub mod timestamp_parser;
pub mod timestamp_request_builder;

pub use algorithm::{resolve_digest_algorithm, translate, SignatureAlgorithm, WireAlgorithmId};
pub use signing_context::{RemoteKey, RemoteSigningClient, SigningContext, SigningIdentity};
pub use timestamp::{TimestampAuthority, TimestampToken};
pub use timestamp_parser::parse_timestamp_response;
pub use timestamp_request_builder::{TimestampRequest, TimestampRequestBuilder};
