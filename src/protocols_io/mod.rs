//! protocols.io API access.
//!
//! - [`bridge`] — authenticated HTTP calls with error records instead of errors
//! - [`step`] — the linked-list step model sent to the steps endpoint
//! - [`ids`] — random GUIDs for new protocols and steps
//! - [`api`] — one method per tool operation

pub mod api;
pub mod bridge;
pub mod ids;
pub mod step;

pub use api::{KeywordSearch, ProtocolFilter, ProtocolId, ProtocolUpdate, ProtocolsIo};
pub use bridge::{ErrorRecord, ResourceBridge, ResourcePath, ResourceRequest};
pub use ids::{generate_id, generate_ids, MAX_GENERATED_IDS};
pub use step::ProtocolStep;
