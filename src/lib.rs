//! anthropic-llm: Anthropic Messages API adapter
//!
//! Translates a provider-agnostic chat conversation into Anthropic requests,
//! returning either the complete text or a stream of text fragments.

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::too_many_lines)]

pub mod cli;
pub mod config;
pub mod error;
pub mod messages;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use error::{LlmError, Result};
pub use messages::{Message, Role};
pub use services::{
    anthropic::{AnthropicLlm, AnthropicLlmConfig},
    GenerateParams, Generation, GenerationOptions, ModelAdapter, TextStream,
};
