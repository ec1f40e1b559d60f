//! Courier integration module
//!
//! This module provides the `ProviderAdapter` interface, one adapter per supported courier, the
//! per-provider status vocabulary tables, the outbound HTTP transport and the registry that maps a
//! provider code to a configured adapter.

/// Capability interface and shared response classification
mod adapter;
/// In-process test courier
mod dummy;
/// Gaau Besi Logistics
mod gaaubesi;
/// Nepal Can Move
mod ncm;
/// Provider code to adapter lookup
mod registry;
/// Raw to canonical status tables
mod status_map;
/// Outbound HTTP
mod transport;
/// Type definitions for courier data structures
mod types;

pub use adapter::{
	ProviderAdapter, classify_create_response, ensure_accepted, extract_error_message, field_label,
	header_value, json_string, sign_payload, verify_shared_secret,
};
pub use dummy::{DUMMY_BASE_URL, DUMMY_CODE, DummyAdapter};
pub use gaaubesi::{GAAUBESI_CODE, GaauBesiAdapter};
pub use ncm::{NCM_CODE, NcmAdapter};
pub use registry::{AdapterConstructor, AdapterRegistry, ConfigSource};
pub use status_map::StatusMap;
pub use transport::{
	DEFAULT_COURIER_TIMEOUT, HttpMethod, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport,
};
pub use types::*;
