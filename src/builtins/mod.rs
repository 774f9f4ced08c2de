//! Built-in function categories. Each module exposes `register(registry)`;
//! `register_all` wires every category into a fresh or shared `Registry`.
//!
//! Grounded on the teacher's `builtins/mod.rs` category-module layout and
//! `register()` entry-point convention, generalized to the typed,
//! overload-aware `Registry` (spec §4.6).

mod support;

pub mod aggregates;
pub mod conversions;
pub mod lists;
pub mod math;
pub mod strings;
pub mod utility;

use crate::error::Result;
use crate::registry::Registry;

/// Registers the full required builtin set (spec §4.6) into `registry`.
pub fn register_all(registry: &Registry) -> Result<()> {
    aggregates::register(registry)?;
    math::register(registry)?;
    strings::register(registry)?;
    conversions::register(registry)?;
    lists::register(registry)?;
    utility::register(registry)?;
    Ok(())
}
