//! Steward Operator Library
//!
//! Step operators and the pieces they share.
//!
//! This crate provides:
//! - The `Execute` capability and the closed `Operator` variant set
//! - Ordered schema probing that resolves a step payload to an operator
//! - Secure streaming tar/gzip extraction
//! - A byte fetcher for local and remote locators
//! - `{{ var }}` template rendering

pub mod archive;
pub mod context;
pub mod error;
pub mod fetch;
pub mod operator;
pub mod ops;
pub mod template;

pub use archive::{extract_archive, ExtractOptions, ExtractSummary};
pub use context::OperatorContext;
pub use error::{ExtractError, FetchError, OperatorError};
pub use fetch::{FetchMetadata, Fetcher};
pub use operator::{Execute, Operator};
