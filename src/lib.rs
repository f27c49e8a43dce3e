//! Core of a spatial-computing experience that overlays virtual geometry on
//! a hand-tracked, reconstructed physical room and pins floating UI panels
//! where the user pinches.
//!
//! The crate owns the anchor-update reconciliation (hand poses and surface
//! meshes into a registry of tracked entities) and the gesture-to-placement
//! computation. Rendering, windowing, and the sensing hardware itself sit
//! behind boundary traits.

pub mod gesture;
pub mod math;
pub mod reconcile;
pub mod registry;
pub mod sensing;
pub mod session;
