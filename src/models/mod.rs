//! Domain data structures.

pub mod item;
pub mod message;

pub use item::{Item, Payload};
pub use message::{extract_handle, extract_profile_link, format_alert};
