//! anthropic-llm binary entry point

use std::io::Write;

use anthropic_llm::{
    cli::{Cli, Commands},
    config::Settings,
    AnthropicLlm, Generation, ModelAdapter,
};
use color_eyre::Result;
use futures::StreamExt;

#[tokio::main]
async fn main() -> Result<()> {
    // Install error handler
    color_eyre::install()?;

    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Set up logging
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("anthropic_llm=debug")
            .with_writer(std::io::stderr)
            .init();
    }

    match cli.command {
        Commands::Generate(args) => {
            let settings = Settings::load_with(cli.config.as_deref())?;
            let llm = AnthropicLlm::new(args.adapter_config(), &settings)?;

            match llm.generate(args.params()).await? {
                Generation::Text(text) => println!("{text}"),
                Generation::Stream(mut stream) => {
                    let mut stdout = std::io::stdout();
                    while let Some(fragment) = stream.next().await {
                        write!(stdout, "{}", fragment?)?;
                        stdout.flush()?;
                    }
                    writeln!(stdout)?;
                }
            }
        }
        Commands::Version => {
            println!("anthropic-llm version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
