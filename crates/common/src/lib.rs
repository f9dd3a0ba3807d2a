//! Shared value types used by every shadowcast crate.

mod types;

pub use types::Transform;

pub fn crate_info() -> &'static str {
    "shadowcast-common v0.1.0"
}
