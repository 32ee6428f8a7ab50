// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train` — trains the recogniser on labelled line images
//   2. `test`  — decodes held-out images with the latest checkpoint
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, TestArgs, TrainArgs};

#[derive(Parser, Debug)]
#[command(
    name = "crnn-ocr",
    version = "0.1.0",
    about = "Train and test a CNN + BiLSTM + CTC text-line recogniser."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Dispatch to the matching use case; routing only.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args) => run_train(args),
            Commands::Test(args)  => run_test(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    tracing::info!("Starting training on examples in: {}", args.examples_path);
    let model_path = args.model_path.clone();
    TrainUseCase::new(args.into()).execute()?;

    println!("Training complete. Checkpoints saved in '{}'.", model_path);
    Ok(())
}

fn run_test(args: TestArgs) -> Result<()> {
    use crate::application::test_use_case::TestUseCase;

    tracing::info!("Testing on examples in: {}", args.examples_path);
    let summary = TestUseCase::new(args.into()).execute()?;

    println!(
        "\nTested {} images ({} batches, {} skipped). Mean edit distance: {:.4}",
        summary.predictions.len(),
        summary.batches,
        summary.skipped,
        summary.mean_error_rate,
    );
    Ok(())
}
