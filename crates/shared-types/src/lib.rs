//! # Shared Types Crate
//!
//! This crate contains the canonical completion event, the inbound webhook
//! envelope, and the rejection taxonomy shared across subsystems.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: All cross-subsystem types are defined here.
//! - **Deterministic Identity**: Event ids are a pure function of the
//!   payload, never random, so redeliveries collapse under deduplication.
//! - **Rejections Are Values**: Malformed input maps to a structured
//!   [`RejectReason`], never a panic or a suppressed exception.

pub mod errors;
pub mod events;

pub use errors::RejectReason;
pub use events::{CompletionEvent, RawEnvelope, COMPLETION_EVENT_TYPE};
