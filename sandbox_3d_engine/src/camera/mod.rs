//! Camera module - first-person camera producing the per-frame view.
//!
//! The renderer does not store cameras; the application owns one and
//! hands its matrices to each frame.

mod camera;

pub use camera::Camera;
