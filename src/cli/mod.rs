// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// Entry point for all user interaction. Parses arguments with
// clap and routes each subcommand to its Layer 2 use case.
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{BatchesArgs, Commands, TrainClfArgs, TrainLmArgs};

#[derive(Parser, Debug)]
#[command(
    name = "transformer-text",
    version,
    about = "Train transformer language models and classifiers on text."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::TrainLm(args)  => run_train_lm(args),
            Commands::TrainClf(args) => run_train_clf(args),
            Commands::Batches(args)  => run_batches(args),
        }
    }
}

fn run_train_lm(args: TrainLmArgs) -> Result<()> {
    use crate::application::train_lm_use_case::TrainLmUseCase;

    tracing::info!("Starting language model training on: {}", args.corpus);
    let checkpoint_dir = args.checkpoint_dir.clone();
    TrainLmUseCase::new(args.into()).execute()?;

    println!("Training complete. Checkpoints in '{checkpoint_dir}'.");
    Ok(())
}

fn run_train_clf(args: TrainClfArgs) -> Result<()> {
    use crate::application::train_clf_use_case::TrainClfUseCase;

    tracing::info!("Starting classifier training on: {}", args.data);
    let checkpoint_dir = args.checkpoint_dir.clone();
    TrainClfUseCase::new(args.into()).execute()?;

    println!("Training complete. Checkpoints in '{checkpoint_dir}'.");
    Ok(())
}

fn run_batches(args: BatchesArgs) -> Result<()> {
    use crate::application::inspect_use_case::InspectBatchesUseCase;

    let report = InspectBatchesUseCase::new(args.into()).execute()?;
    println!("{report}");
    Ok(())
}
