// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `test`
// and all their configurable flags.
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::{test_use_case::TestConfig, train_use_case::TrainConfig};
use crate::domain::alphabet::DEFAULT_CHARSET;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the recogniser on a directory of labelled line images
    Train(TrainArgs),

    /// Decode the test partition with the latest checkpoint
    Test(TestArgs),
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory of images named <label>_<anything>.<ext>
    #[arg(short = 'e', long)]
    pub examples_path: String,

    /// Directory for checkpoints, config, metrics and the exported model
    #[arg(short = 'm', long, default_value = "save")]
    pub model_path: String,

    /// Alphabet as a literal string or a path to a text file
    #[arg(short = 'c', long, default_value = DEFAULT_CHARSET)]
    pub char_set: String,

    #[arg(short = 'b', long, default_value_t = 64)]
    pub batch_size: usize,

    /// Number of training iterations (capped passes over the training partition)
    #[arg(short = 'i', long, default_value_t = 10)]
    pub iteration_count: usize,

    /// Images wider than this are shrunk to fit
    #[arg(short = 'w', long, default_value_t = 100)]
    pub max_image_width: usize,

    /// Adam learning rate
    #[arg(short = 'l', long, default_value_t = 1e-4)]
    pub learning_rate: f64,

    /// Fraction of the examples used for training, the rest is the test partition
    #[arg(short = 't', long, default_value_t = 0.70)]
    pub train_test_ratio: f64,

    /// Resume from the latest checkpoint in the model directory
    #[arg(short = 'r', long)]
    pub restore: bool,

    /// Hard ceiling on batches per iteration
    #[arg(long, default_value_t = 100)]
    pub max_batches_per_epoch: usize,

    #[arg(long, default_value_t = 100)]
    pub beam_width: usize,

    /// Keep only file paths in memory and decode images per batch
    #[arg(long)]
    pub lazy_load: bool,

    /// File stem of the exported evaluation model inside the model directory
    #[arg(long, default_value = "frozen")]
    pub export_name: String,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            examples_path:         a.examples_path,
            model_path:            a.model_path,
            char_set:              a.char_set,
            batch_size:            a.batch_size,
            iteration_count:       a.iteration_count,
            max_image_width:       a.max_image_width,
            learning_rate:         a.learning_rate,
            train_test_ratio:      a.train_test_ratio,
            restore:               a.restore,
            max_batches_per_epoch: a.max_batches_per_epoch,
            beam_width:            a.beam_width,
            lazy_load:             a.lazy_load,
            export_name:           a.export_name,
        }
    }
}

/// All arguments for the `test` command
#[derive(Args, Debug)]
pub struct TestArgs {
    #[arg(short = 'e', long)]
    pub examples_path: String,

    /// Directory where training saved its checkpoints
    #[arg(short = 'm', long, default_value = "save")]
    pub model_path: String,

    /// Alphabet override; defaults to the one saved by `train`
    #[arg(short = 'c', long)]
    pub char_set: Option<String>,

    /// Image width override; defaults to the one saved by `train`
    #[arg(short = 'w', long)]
    pub max_image_width: Option<usize>,

    #[arg(short = 'b', long, default_value_t = 64)]
    pub batch_size: usize,

    /// 0.0 evaluates every example in the directory
    #[arg(short = 't', long, default_value_t = 0.0)]
    pub train_test_ratio: f64,

    #[arg(long, default_value_t = 100)]
    pub beam_width: usize,

    #[arg(long)]
    pub lazy_load: bool,
}

impl From<TestArgs> for TestConfig {
    fn from(a: TestArgs) -> Self {
        TestConfig {
            examples_path:    a.examples_path,
            model_path:       a.model_path,
            char_set:         a.char_set,
            max_image_width:  a.max_image_width,
            batch_size:       a.batch_size,
            train_test_ratio: a.train_test_ratio,
            beam_width:       a.beam_width,
            lazy_load:        a.lazy_load,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::Cli;

    #[test]
    fn test_train_defaults() {
        let cli = Cli::try_parse_from(["crnn-ocr", "train", "-e", "samples"]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg = TrainConfig::from(args);
        assert_eq!(cfg.examples_path, "samples");
        assert_eq!(cfg.batch_size, 64);
        assert_eq!(cfg.max_image_width, 100);
        assert_eq!(cfg.train_test_ratio, 0.70);
        assert_eq!(cfg.char_set, DEFAULT_CHARSET);
        assert!(!cfg.restore);
    }

    #[test]
    fn test_test_command_defaults_to_full_test_partition() {
        let cli = Cli::try_parse_from(["crnn-ocr", "test", "-e", "samples", "-w", "64"]).unwrap();
        let Commands::Test(args) = cli.command else { panic!("expected test") };
        let cfg = TestConfig::from(args);
        assert_eq!(cfg.train_test_ratio, 0.0);
        assert_eq!(cfg.max_image_width, Some(64));
        assert!(cfg.char_set.is_none());
    }

    #[test]
    fn test_examples_path_is_required() {
        assert!(Cli::try_parse_from(["crnn-ocr", "train"]).is_err());
    }
}
