//! Composition worker.
//!
//! This crate provides:
//! - A job controller with a bounded worker pool and status tracking
//! - The composition pipeline (durations, audio, images, render, publish)
//! - Cancellation that reaches the running encoder
//! - Structured per-job logging

pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod registry;

pub use config::WorkerConfig;
pub use controller::{CompositionRequest, JobContext, JobController, JobHandler};
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use pipeline::{output_file_name, CompositionPipeline};
pub use registry::{JobRegistry, ProgressReporter};
