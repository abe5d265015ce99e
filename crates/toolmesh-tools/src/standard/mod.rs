//! Built-in tool sets.
//!
//! Each set exposes a `register` function that adds its tools to a
//! [`ToolRegistry`](crate::ToolRegistry).

#[cfg(feature = "math")]
pub mod math;
#[cfg(feature = "weather")]
pub mod weather;
