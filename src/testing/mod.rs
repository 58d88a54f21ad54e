//! Testing utilities
//!
//! A scriptable in-process SDK and synthetic frame content for running the
//! driver without a Percipio camera attached.

pub mod simulated_sdk;
pub mod synthetic_data;

pub use simulated_sdk::SimulatedSdk;
pub use synthetic_data::{
    synthetic_color_formats, synthetic_color_frame, synthetic_depth_frame, synthetic_descriptor,
};
