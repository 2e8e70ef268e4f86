//! # diffscribe
//!
//! Turns git diffs into task descriptions and conventional commit messages
//! using hosted or local LLM providers.
//!
//! ## Features
//!
//! - Automatic provider selection with fallback across Groq, OpenAI, a
//!   shared community tier and local OpenAI-compatible endpoints
//! - Canonical model names mapped to each provider's own identifiers
//! - Tolerant parsing of labeled completions into structured results
//!
//! ## Quick Start
//!
//! ```no_run
//! use diffscribe::{generate, GenerateOptions};
//!
//! # async fn run() -> Result<(), diffscribe::EngineError> {
//! let outcome = generate("+console.log('x')\n", &GenerateOptions::default()).await?;
//! if let Some(task) = outcome.generation.as_task() {
//!     println!("{}", task.title);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod engine;
pub mod git;

pub use crate::cli::Cli;
pub use crate::engine::{
    generate, generate_with, EngineError, GenerateOptions, Generation, GenerationOutcome,
};

/// The current version of diffscribe.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
