pub mod animation;
pub mod app;
pub mod calibration;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod frame;
pub mod loaders;
pub mod mesh;
pub mod pose;
pub mod render;
pub mod sources;
pub mod traits;
pub mod transform;

pub use error::{ArError, Result};
