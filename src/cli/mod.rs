//! CLI argument parsing

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::{
    messages::Message,
    services::{GenerateParams, DEFAULT_MAX_TOKENS},
    AnthropicLlmConfig,
};

/// Default model for the `generate` command
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";

/// anthropic-llm: generate text with the Anthropic Messages API
#[derive(Debug, Parser)]
#[command(name = "anthropic-llm")]
#[command(about = "Generate text with the Anthropic Messages API", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file to read instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Generate a completion for a prompt
    Generate(GenerateArgs),

    /// Show version information
    Version,
}

/// Arguments of the `generate` command
#[derive(Debug, Clone, clap::Args)]
pub struct GenerateArgs {
    /// User prompt
    pub prompt: String,

    /// System instruction
    #[arg(long)]
    pub system: Option<String>,

    /// Model identifier
    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Maximum tokens to generate
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,

    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Nucleus sampling probability
    #[arg(long)]
    pub top_p: Option<f32>,

    /// Custom API endpoint
    #[arg(long, env = "ANTHROPIC_BASE_URL")]
    pub base_url: Option<String>,

    /// API key, overriding configured keys
    #[arg(long)]
    pub api_key: Option<String>,

    /// Print fragments as they arrive
    #[arg(long)]
    pub stream: bool,
}

impl GenerateArgs {
    /// Adapter construction arguments
    #[must_use]
    pub fn adapter_config(&self) -> AnthropicLlmConfig {
        AnthropicLlmConfig {
            api_key: self.api_key.clone(),
            user_api_key: None,
            base_url: self.base_url.clone(),
        }
    }

    /// Generation parameters for the prompt
    #[must_use]
    pub fn params(&self) -> GenerateParams {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system {
            messages.push(Message::system(system.clone()));
        }
        messages.push(Message::user(self.prompt.clone()));

        let mut params = GenerateParams::new(self.model.clone(), messages)
            .max_tokens(self.max_tokens)
            .stream(self.stream);
        params.options.temperature = self.temperature;
        params.options.top_p = self.top_p;
        params
    }
}

impl Cli {
    /// Parse CLI arguments from environment
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
