//! Platform abstraction layer
//!
//! Handles browser/native differences for:
//! - Keyboard input (key codes to simulation commands)
//! - Storage (LocalStorage on web)
//! - Host page bindings (wasm32 only)

pub mod keymap;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use keymap::{KeyAction, key_down, key_up};
