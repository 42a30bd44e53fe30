pub mod config;
pub mod error;
pub mod features;
pub mod labeling;
pub mod model;
pub mod pipeline;
pub mod risk;
pub mod tx;
