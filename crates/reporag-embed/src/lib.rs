//! Sentence embedders for the retrieval engine.
//!
//! `BertEmbedder` runs a local BERT sentence encoder (all-MiniLM-L6-v2 by
//! default) with candle. `FakeEmbedder` hashes tokens into a fixed-size
//! vector and is selected with `APP_USE_FAKE_EMBEDDINGS=1` for fast,
//! deterministic tests and development.

use anyhow::{anyhow, Context};
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;

use reporag_core::config::EmbeddingSettings;
use reporag_core::error::{Error, Result};
use reporag_core::traits::Embedder;

pub mod device;
pub mod pool;
pub mod tokenize;

pub use pool::masked_mean_l2;

const DEFAULT_MODEL: &str = "all-MiniLM-L6-v2";
const BATCH_SIZE: usize = 32;

pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
    pad_id: u32,
}

impl BertEmbedder {
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        Self::load_inner(model_dir, max_len).map_err(|e| {
            Error::InvalidConfig(format!(
                "failed to load embedding model from {}: {e:#}",
                model_dir.display()
            ))
        })
    }

    fn load_inner(model_dir: &Path, max_len: usize) -> anyhow::Result<Self> {
        let device = device::select_device();
        tracing::info!(dir = %model_dir.display(), "loading sentence encoder");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| {
                anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e)
            })?;
        let pad_id = tokenizer.token_to_id("[PAD]").unwrap_or(0);

        let config_path = model_dir.join("config.json");
        let raw: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?,
        )?;
        let dim = hidden_size(&raw)
            .ok_or_else(|| anyhow!("hidden_size missing from {}", config_path.display()))?;
        let config: BertConfig = serde_json::from_value(raw)?;

        let safetensors = model_dir.join("model.safetensors");
        let weights = if safetensors.exists() {
            candle_core::safetensors::load(&safetensors, &device)?
        } else {
            let bin = model_dir.join("pytorch_model.bin");
            candle_core::pickle::read_all(&bin)?.into_iter().collect()
        };
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = BertModel::load(vb, &config)?;

        tracing::info!(dim, max_len, "sentence encoder loaded");
        Ok(Self { model, tokenizer, device, dim, max_len, pad_id })
    }

    fn embed_chunk(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let (input_ids, attention_mask) = tokenize::tokenize_batch(
            &self.tokenizer,
            texts,
            self.max_len,
            self.pad_id,
            &self.device,
        )?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let vectors: Vec<Vec<f32>> =
            pooled.to_dtype(DType::F32)?.to_device(&Device::Cpu)?.to_vec2()?;
        if let Some(v) = vectors.iter().find(|v| v.len() != self.dim) {
            return Err(anyhow!("model produced {}-d vector, expected {}", v.len(), self.dim));
        }
        Ok(vectors)
    }
}

fn hidden_size(config: &serde_json::Value) -> Option<usize> {
    config
        .get("hidden_size")
        .and_then(serde_json::Value::as_u64)
        .and_then(|v| usize::try_from(v).ok())
}

impl Embedder for BertEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        self.max_len
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(BATCH_SIZE) {
            let vectors = self
                .embed_chunk(chunk)
                .map_err(|e| Error::Unavailable(format!("embedding failed: {e:#}")))?;
            out.extend(vectors);
        }
        tracing::debug!(
            count = texts.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "embedded batch"
        );
        Ok(out)
    }
}

/// Deterministic bag-of-tokens hashing embedder. L2-normalized.
pub struct FakeEmbedder {
    dim: usize,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    fn embed_one(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;

        let mut v = vec![0f32; self.dim];
        let tokens = text
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|t| !t.is_empty());
        for (i, token) in tokens.enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let val = f64::from((h >> 32) as u32) / f64::from(u32::MAX);
            v[idx] += val as f32 + (i % 3) as f32 * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn max_len(&self) -> usize {
        usize::MAX
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

/// Build the embedder selected by configuration. A missing model directory is
/// a configuration error.
pub fn get_default_embedder(
    settings: &EmbeddingSettings,
    use_fake: bool,
) -> Result<Box<dyn Embedder>> {
    if use_fake {
        tracing::info!(dim = settings.dim, "using FakeEmbedder");
        return Ok(Box::new(FakeEmbedder::new(settings.dim)));
    }
    let dir = resolve_model_dir(settings.model_dir.as_deref())?;
    let embedder = BertEmbedder::load(&dir, settings.max_len)?;
    if embedder.dim() != settings.dim {
        return Err(Error::DimensionMismatch { expected: settings.dim, actual: embedder.dim() });
    }
    Ok(Box::new(embedder))
}

fn resolve_model_dir(configured: Option<&str>) -> Result<PathBuf> {
    let candidates = configured
        .map(PathBuf::from)
        .into_iter()
        .chain(std::env::var("APP_MODEL_DIR").ok().map(PathBuf::from))
        .chain(std::env::var("MODEL_DIR").ok().map(PathBuf::from))
        .chain([
            Path::new("../models").join(DEFAULT_MODEL),
            Path::new("models").join(DEFAULT_MODEL),
        ]);
    for p in candidates {
        if p.exists() {
            tracing::info!(dir = %p.display(), "using model dir");
            return Ok(p);
        }
    }
    Err(Error::InvalidConfig(format!(
        "Could not locate {DEFAULT_MODEL} model directory. Checked embedding.model_dir, \
         APP_MODEL_DIR, MODEL_DIR, ../models/{DEFAULT_MODEL} and models/{DEFAULT_MODEL}"
    )))
}
