// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder,
// plus the JSON configs needed to rebuild a model before its
// weights can be loaded back.
//
// Directory layout:
//   checkpoints/
//     model_epoch_1.mpk.gz   ← weights after epoch 1
//     model_epoch_2.mpk.gz
//     ...
//     latest_epoch.json      ← number of the newest epoch
//     best_epoch.json        ← epoch with the lowest valid_loss
//     train_config.json      ← run settings (any serde type)
//     model_config.json      ← burn model config
//
// Any burn Module can be stored; the recorder checks the record
// against the module it is loaded into, so a mismatched
// architecture fails at load time instead of producing garbage.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::CompactRecorder,
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fs, path::PathBuf};

pub const TRAIN_CONFIG_FILE: &str = "train_config.json";
pub const MODEL_CONFIG_FILE: &str = "model_config.json";
const LATEST_EPOCH_FILE:     &str = "latest_epoch.json";
const BEST_EPOCH_FILE:       &str = "best_epoch.json";

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Use `dir` for checkpoints, creating it if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create checkpoint dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    fn model_path(&self, epoch: usize) -> PathBuf {
        self.dir.join(format!("model_epoch_{epoch}"))
    }

    /// Write the weights for `epoch` and mark it as the latest.
    pub fn save_model<B: Backend, M: Module<B>>(&self, model: &M, epoch: usize) -> Result<()> {
        let path = self.model_path(epoch);
        model
            .clone()
            .save_file(path.clone(), &CompactRecorder::new())
            .map_err(|e| anyhow::anyhow!("Failed to save checkpoint to '{}': {e:?}", path.display()))?;

        fs::write(self.dir.join(LATEST_EPOCH_FILE), serde_json::to_string(&epoch)?)
            .context("Failed to write latest_epoch.json")?;

        tracing::debug!("Saved checkpoint: epoch {}", epoch);
        Ok(())
    }

    /// Load the newest weights into `model`.
    pub fn load_model<B: Backend, M: Module<B>>(&self, model: M, device: &B::Device) -> Result<M> {
        let epoch = self.latest_epoch()?;
        let path  = self.model_path(epoch);
        tracing::info!("Loading checkpoint from epoch {}", epoch);

        model
            .load_file(path.clone(), &CompactRecorder::new(), device)
            .map_err(|e| anyhow::anyhow!("Cannot load checkpoint '{}': {e:?}", path.display()))
    }

    /// Store any serde config as pretty JSON under `name`.
    pub fn save_config<C: Serialize>(&self, name: &str, cfg: &C) -> Result<()> {
        let path = self.dir.join(name);
        fs::write(&path, serde_json::to_string_pretty(cfg)?)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved config to '{}'", path.display());
        Ok(())
    }

    pub fn load_config<C: DeserializeOwned>(&self, name: &str) -> Result<C> {
        let path = self.dir.join(name);
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
        serde_json::from_str(&json)
            .with_context(|| format!("Malformed config '{}'", path.display()))
    }

    /// Epoch of the newest saved weights.
    pub fn latest_epoch(&self) -> Result<usize> {
        let s = fs::read_to_string(self.dir.join(LATEST_EPOCH_FILE))
            .context("Cannot find 'latest_epoch.json'. Has a model been trained here?")?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }

    /// Record `epoch` as the best one so far.
    pub fn mark_best(&self, epoch: usize) -> Result<()> {
        fs::write(self.dir.join(BEST_EPOCH_FILE), serde_json::to_string(&epoch)?)
            .context("Failed to write best_epoch.json")
    }

    /// Epoch with the lowest validation loss seen so far.
    pub fn best_epoch(&self) -> Result<usize> {
        let s = fs::read_to_string(self.dir.join(BEST_EPOCH_FILE))
            .context("Cannot find 'best_epoch.json'")?;
        Ok(serde_json::from_str::<usize>(&s)?)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::encoder::{TransformerEncoder, TransformerEncoderConfig};
    use burn::backend::NdArray;
    use tempfile::tempdir;

    type TestBackend = NdArray;

    fn weights(enc: &TransformerEncoder<TestBackend>) -> Vec<f32> {
        enc.embed.token_weight().into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_model_round_trip() {
        let dir    = tempdir().unwrap();
        let ckpt   = CheckpointManager::new(dir.path().join("ckpt")).unwrap();
        let device = Default::default();
        let cfg    = TransformerEncoderConfig::new(12, 6, 8, 2, 1, 0);

        let saved = cfg.init::<TestBackend>(&device);
        ckpt.save_model(&saved, 1).unwrap();
        ckpt.save_model(&saved, 2).unwrap();
        assert_eq!(ckpt.latest_epoch().unwrap(), 2);

        let fresh  = cfg.init::<TestBackend>(&device);
        assert_ne!(weights(&fresh), weights(&saved));
        let loaded = ckpt.load_model(fresh, &device).unwrap();
        // CompactRecorder stores half precision
        for (a, b) in weights(&loaded).iter().zip(weights(&saved)) {
            assert!((a - b).abs() < 1e-2, "{a} vs {b}");
        }
    }

    #[test]
    fn test_config_round_trip() {
        let dir  = tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        let cfg  = TransformerEncoderConfig::new(100, 70, 32, 4, 3, 0).with_causal(false);

        ckpt.save_config(MODEL_CONFIG_FILE, &cfg).unwrap();
        let back: TransformerEncoderConfig = ckpt.load_config(MODEL_CONFIG_FILE).unwrap();
        assert_eq!(back.n_ctx, 70);
        assert!(!back.causal);
    }

    #[test]
    fn test_best_epoch_overwritten() {
        let dir  = tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        assert!(ckpt.best_epoch().is_err());

        ckpt.mark_best(1).unwrap();
        ckpt.mark_best(3).unwrap();
        assert_eq!(ckpt.best_epoch().unwrap(), 3);
    }

    #[test]
    fn test_missing_checkpoint_is_error() {
        let dir  = tempdir().unwrap();
        let ckpt = CheckpointManager::new(dir.path()).unwrap();
        assert!(ckpt.latest_epoch().is_err());
    }
}
