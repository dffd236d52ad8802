//! Presentation helpers shared by the `shelf` binary and its tests.
pub mod render;
