//! Input snapshot handed to the camera once per frame.
//!
//! # Invariants
//! - There is no process-wide input state; the platform layer owns one
//!   `InputState` and passes it by reference.
//! - Mouse motion accumulates until `end_frame`; wheel motion accumulates
//!   until a consumer takes it.

pub mod state;

pub use state::{InputState, Key, MouseButton};

pub fn crate_info() -> &'static str {
    "shadowcast-input v0.1.0"
}
