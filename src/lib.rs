//
// lib.rs
// Image-Tools-rs
//
// Exposes the crate's modules and re-exports the CLI entry point for both binary and library consumers.
//

// Public surface of the library: traversal, per-file transforms, and the batch dispatcher that ties them together.
pub mod batch;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod image;
pub mod models;
pub mod negate;
pub mod operation;
pub mod pixels;
pub mod walker;

pub use batch::BatchDispatcher;
pub use cancel::CancellationToken;
pub use cli::{run as run_cli, Cli, Commands};
pub use config::BatchConfig;
pub use engine::ImageTransformEngine;
pub use models::BatchReport;
pub use operation::OperationRequest;
