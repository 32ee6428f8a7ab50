// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's recorders.
//
// File layout of the model directory:
//
//   <model_path>/
//     ckp-0.mpk.gz            ← weights after step 0
//     ckp-0-optim.mpk.gz      ← Adam moments after step 0
//     ckp-1.mpk.gz
//     ckp-1-optim.mpk.gz
//     ...                     ← at most MAX_TO_KEEP steps of these
//     latest_checkpoint.json  ← {"identifier": "ckp-12"}
//     train_config.json       ← architecture, alphabet, run settings
//     frozen.bin              ← evaluation weights, full precision
//     frozen.json             ← manifest of the exported model
//     metrics.csv
//
// The step counter lives in the checkpoint identifier, so a
// restored run continues numbering where the last one stopped.
//
// Reference: Burn Book §5 (Records and Checkpointing)
//            Rust Book §9 (Error Handling)

use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};
use burn::{
    prelude::*,
    record::{BinFileRecorder, CompactRecorder, FullPrecisionSettings, Record, Recorder},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::ml::model::CrnnModel;

/// Checkpoints kept on disk, older ones are deleted after each save
pub const MAX_TO_KEEP: usize = 10;

const CHECKPOINT_PREFIX: &str = "ckp-";
const OPTIM_SUFFIX:      &str = "-optim";
const LATEST_FILE:       &str = "latest_checkpoint.json";
const CONFIG_FILE:       &str = "train_config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LatestCheckpoint {
    identifier: String,
}

/// Name, element type and shape of one exported tensor.
/// `None` marks an axis whose size is chosen at run time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorSpec {
    pub name:  String,
    pub dtype: String,
    pub shape: Vec<Option<usize>>,
}

impl TensorSpec {
    fn new(name: &str, dtype: &str, shape: Vec<Option<usize>>) -> Self {
        Self { name: name.into(), dtype: dtype.into(), shape }
    }
}

/// Everything a consumer needs to run the exported model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceManifest {
    pub weights:         String,
    pub inputs:          Vec<TensorSpec>,
    pub outputs:         Vec<TensorSpec>,
    pub alphabet:        String,
    pub max_image_width: usize,
    pub max_char_count:  usize,
    pub num_classes:     usize,
    pub beam_width:      usize,
}

impl InferenceManifest {
    pub fn new(
        weights:         impl Into<String>,
        alphabet:        impl Into<String>,
        max_image_width: usize,
        max_char_count:  usize,
        num_classes:     usize,
        beam_width:      usize,
    ) -> Self {
        Self {
            weights: weights.into(),
            inputs: vec![
                TensorSpec::new("input", "f32", vec![None, Some(1), Some(max_image_width), Some(32)]),
                TensorSpec::new("seq_len", "i32", vec![None]),
            ],
            outputs: vec![TensorSpec::new("dense_decoded", "i64", vec![None, None])],
            alphabet: alphabet.into(),
            max_image_width,
            max_char_count,
            num_classes,
            beam_width,
        }
    }
}

/// Manages saving and loading of model checkpoints.
/// All files are stored in the configured directory.
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Creates the directory if it doesn't already exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create model directory '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes {dir}/ckp-{step}.mpk.gz, moves the latest pointer and
    /// prunes checkpoints beyond the retention limit.
    pub fn save_model<B: Backend>(&self, model: &CrnnModel<B>, step: usize) -> Result<String> {
        let identifier = checkpoint_identifier(step);
        let path = self.dir.join(&identifier);

        CompactRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", path.display()))?;

        let latest = LatestCheckpoint { identifier: identifier.clone() };
        fs::write(self.dir.join(LATEST_FILE), serde_json::to_string(&latest)?)
            .with_context(|| format!("Failed to write {LATEST_FILE}"))?;

        self.prune()?;
        tracing::debug!("Saved checkpoint {}", identifier);
        Ok(identifier)
    }

    /// Writes the optimiser state of `step` to {dir}/ckp-{step}-optim.mpk.gz.
    /// Call before `save_model`, which moves the latest pointer and prunes.
    pub fn save_optimizer<B: Backend, R: Record<B>>(&self, record: R, step: usize) -> Result<()> {
        let path = self.optimizer_path(step);
        <CompactRecorder as Recorder<B>>::record(&CompactRecorder::new(), record, path.clone())
            .with_context(|| format!("Failed to save optimizer state to '{}'", path.display()))?;
        Ok(())
    }

    /// Optimiser state saved with checkpoint `step`, None if there is none
    pub fn load_optimizer<B: Backend, R: Record<B>>(
        &self,
        step:   usize,
        device: &B::Device,
    ) -> Result<Option<R>> {
        let path = self.optimizer_path(step);
        if !path.with_extension("mpk.gz").exists() {
            return Ok(None);
        }
        let record = <CompactRecorder as Recorder<B>>::load::<R>(&CompactRecorder::new(), path.clone(), device)
            .with_context(|| format!("Cannot load optimizer state '{}'", path.display()))?;
        Ok(Some(record))
    }

    fn optimizer_path(&self, step: usize) -> PathBuf {
        self.dir.join(format!("{}{OPTIM_SUFFIX}", checkpoint_identifier(step)))
    }

    /// Identifier and step of the newest checkpoint, None before the first save
    pub fn latest_checkpoint(&self) -> Result<Option<(String, usize)>> {
        let path = self.dir.join(LATEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read '{}'", path.display()))?;
        let latest: LatestCheckpoint = serde_json::from_str(&json)
            .with_context(|| format!("Malformed '{}'", path.display()))?;

        let Some(step) = step_from_identifier(&latest.identifier) else {
            bail!("Checkpoint identifier '{}' has no step number", latest.identifier);
        };
        Ok(Some((latest.identifier, step)))
    }

    /// Loads the newest checkpoint into `model`.
    /// Returns the model unchanged and None when nothing was saved yet.
    pub fn load_latest<B: Backend>(
        &self,
        model:  CrnnModel<B>,
        device: &B::Device,
    ) -> Result<(CrnnModel<B>, Option<usize>)> {
        let Some((identifier, step)) = self.latest_checkpoint()? else {
            return Ok((model, None));
        };
        let path = self.dir.join(&identifier);

        tracing::info!("Loading checkpoint {}", identifier);
        let record = CompactRecorder::new()
            .load(path.clone(), device)
            .with_context(|| {
                format!("Cannot load checkpoint '{}'. Was it saved with the same alphabet and image width?",
                    path.display())
            })?;

        Ok((model.load_record(record), Some(step)))
    }

    /// Writes evaluation weights to {dir}/{name}.bin and the manifest to {dir}/{name}.json
    pub fn export_inference_model<B: Backend>(
        &self,
        model:    &CrnnModel<B>,
        name:     &str,
        manifest: &InferenceManifest,
    ) -> Result<PathBuf> {
        if name.trim().is_empty() {
            bail!("Save path for the exported model is not specified");
        }
        let path = self.dir.join(name);

        BinFileRecorder::<FullPrecisionSettings>::new()
            .record(model.clone().into_record(), path.clone())
            .with_context(|| format!("Failed to export model to '{}'", path.display()))?;

        let manifest_path = path.with_extension("json");
        fs::write(&manifest_path, serde_json::to_string_pretty(manifest)?)
            .with_context(|| format!("Cannot write manifest '{}'", manifest_path.display()))?;

        tracing::debug!("Exported inference model to '{}'", path.display());
        Ok(path)
    }

    pub fn save_config<T: Serialize>(&self, cfg: &T) -> Result<()> {
        let path = self.dir.join(CONFIG_FILE);
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    /// None when no training run has written a config to this directory
    pub fn load_config<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        let path = self.dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Steps of every checkpoint file on disk, ascending and unique
    pub fn saved_steps(&self) -> Result<Vec<usize>> {
        let mut steps = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            if let Some(step) = name.to_str().and_then(step_from_identifier) {
                steps.push(step);
            }
        }
        steps.sort_unstable();
        steps.dedup();
        Ok(steps)
    }

    fn prune(&self) -> Result<()> {
        let steps = self.saved_steps()?;
        if steps.len() <= MAX_TO_KEEP {
            return Ok(());
        }
        let expired = &steps[..steps.len() - MAX_TO_KEEP];

        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name  = entry.file_name();
            let Some(step) = name.to_str().and_then(step_from_identifier) else { continue };
            if expired.contains(&step) {
                fs::remove_file(entry.path())
                    .with_context(|| format!("Cannot remove old checkpoint '{}'", entry.path().display()))?;
                tracing::debug!("Removed checkpoint {:?}", name);
            }
        }
        Ok(())
    }
}

pub fn checkpoint_identifier(step: usize) -> String {
    format!("{CHECKPOINT_PREFIX}{step}")
}

/// "ckp-12", "ckp-12.mpk.gz" or "ckp-12-optim.mpk.gz" → 12
pub fn step_from_identifier(identifier: &str) -> Option<usize> {
    identifier
        .strip_prefix(CHECKPOINT_PREFIX)?
        .split(['.', '-'])
        .next()?
        .parse()
        .ok()
}
