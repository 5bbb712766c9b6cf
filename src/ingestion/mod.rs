//! Input side of the pipeline.
//!
//! - [`notification`]: turns an object-created event document into [`crate::types::Notification`]s
//! - [`decode`]: turns one source object's bytes into candidate records (JSON document, JSON
//!   array, or NDJSON)

pub mod decode;
pub mod notification;

pub use decode::{decode_payload, decode_str};
pub use notification::parse_event;
