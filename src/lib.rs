//! # broadcast-llm
//!
//! Concurrent broadcast of one prompt to many LLM targets, with structured
//! recovery of improvement replies.
//!
//! ## Key Features
//!
//! - **Fan-out dispatch**: one bounded task per target, outcomes in
//!   completion order, no target's failure aborts the batch
//! - **Target registry**: cached snapshots over pluggable stores, explicit
//!   invalidation, call-time credential resolution
//! - **Provider adapters**: OpenAI-compatible and Anthropic-native wire
//!   formats behind one `send` call
//! - **Structured parsing**: layered best-effort recovery of improvement
//!   replies from JSON, marked sections, or plain text
//! - **Cooperative cancellation**: abandon a batch mid-flight and still get
//!   one outcome per target
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use broadcast_llm::{
//!     DispatchParams, Dispatcher, EnvCredentialSource, ProviderAdapter, TargetRegistry,
//! };
//! # use broadcast_llm::{DispatchResult, TargetRecord, TargetStore};
//! # struct FixtureStore;
//! # #[async_trait::async_trait]
//! # impl TargetStore for FixtureStore {
//! #     async fn load_targets(&self) -> DispatchResult<Vec<TargetRecord>> {
//! #         Ok(Vec::new())
//! #     }
//! # }
//! # async fn example() -> DispatchResult<()> {
//! let registry = Arc::new(TargetRegistry::new(
//!     Arc::new(FixtureStore),
//!     Arc::new(EnvCredentialSource::from_dotenv()),
//! ));
//! let adapter = Arc::new(ProviderAdapter::new(DispatchParams::default()));
//! let dispatcher = Dispatcher::new(Arc::clone(&registry), adapter);
//!
//! let targets = registry.list(true).await?;
//! let outcomes = dispatcher
//!     .dispatch_all(&targets, "Compare your answers.", |completed, total| {
//!         eprintln!("{completed}/{total} targets answered");
//!     })
//!     .await;
//!
//! for outcome in &outcomes {
//!     println!("{}: success = {}", outcome.target_name, outcome.is_success());
//! }
//! # Ok(())
//! # }
//! ```

// Allow missing errors documentation - errors are self-documenting via type signatures
#![allow(clippy::missing_errors_doc)]

// Logging utilities (re-exports tracing with log_* naming) - internal only
pub(crate) mod logging;

pub mod config;
pub mod dispatch;
pub mod error;
pub mod improver;
pub mod providers;
pub mod registry;
pub mod response_parser;

#[cfg(test)]
pub mod tests;

// Re-export main types
pub use config::DispatchParams;
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use error::{DispatchError, DispatchResult, ErrorCategory};
pub use improver::{meta_prompt, PromptImprover, StructuredImprovementResult};
pub use providers::{ProviderAdapter, ProviderReply};
pub use response_parser::StructuredResponseParser;

// Re-export registry types (targets, stores, credentials)
pub use registry::{
    CredentialCheck, CredentialSource, EnvCredentialSource, ProviderKind, Target, TargetId,
    TargetRecord, TargetRegistry, TargetStore,
};
