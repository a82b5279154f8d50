use anyhow::Result;
use clap::Parser;
use transformer_text::cli::Cli;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("transformer_text=info".parse()?),
        )
        .init();

    Cli::parse().run()
}
