//! Embedding generation boundary.
//!
//! The store consumes `EmbeddingProvider` as a black box: text in, vector
//! out, or unavailable. `FastembedProvider` is the production
//! implementation, loading a local fastembed model lazily on first use.

use std::path::PathBuf;
use std::sync::Mutex;

use fastembed::{InitOptions, TextEmbedding};

#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// The provider cannot serve right now. Degrades indexing and search
    /// to a no-op for the affected item; never fatal.
    #[error("embedding provider unavailable: {0}")]
    Unavailable(String),

    #[error("model initialization failed: {0}")]
    InitFailed(String),

    #[error("embedding generation failed: {0}")]
    Failed(String),

    #[error("unknown model: {0}")]
    InvalidModel(String),
}

pub trait EmbeddingProvider: Send + Sync {
    /// Stable identifier of the embedding space. The index blob is tagged
    /// with it and invalidated on mismatch.
    fn model_id(&self) -> String;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

/// Local embedding provider backed by fastembed. The model downloads on
/// first use and is cached under `<cache_dir>/models`; fastembed's
/// `embed()` takes `&mut self`, hence the Mutex.
pub struct FastembedProvider {
    model_name: String,
    cache_dir: PathBuf,
    model: Mutex<Option<TextEmbedding>>,
}

impl FastembedProvider {
    pub fn new(model_name: &str, cache_dir: PathBuf) -> Self {
        FastembedProvider {
            model_name: model_name.to_string(),
            cache_dir,
            model: Mutex::new(None),
        }
    }

    fn parse_model_name(name: &str) -> Result<fastembed::EmbeddingModel, EmbedError> {
        match name.to_lowercase().as_str() {
            "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
            "all-minilm-l6-v2-q" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2Q),
            "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
            "bge-small-en-v1.5-q" => Ok(fastembed::EmbeddingModel::BGESmallENV15Q),
            "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
            "bge-base-en-v1.5-q" => Ok(fastembed::EmbeddingModel::BGEBaseENV15Q),
            _ => Err(EmbedError::InvalidModel(format!(
                "{name}. Supported: all-MiniLM-L6-v2, bge-small-en-v1.5, \
                 bge-base-en-v1.5 (-q suffix for quantized)"
            ))),
        }
    }

    fn init_model(&self) -> Result<TextEmbedding, EmbedError> {
        let model_enum = Self::parse_model_name(&self.model_name)?;

        let models_dir = self.cache_dir.join("models");
        std::fs::create_dir_all(&models_dir)
            .map_err(|err| EmbedError::InitFailed(format!("models directory: {err}")))?;

        log::info!("loading embedding model {}", self.model_name);
        let options = InitOptions::new(model_enum)
            .with_cache_dir(models_dir)
            .with_show_download_progress(true);

        TextEmbedding::try_new(options).map_err(|err| EmbedError::Unavailable(err.to_string()))
    }
}

impl EmbeddingProvider for FastembedProvider {
    fn model_id(&self) -> String {
        self.model_name.clone()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut guard = self
            .model
            .lock()
            .map_err(|err| EmbedError::Failed(format!("model lock poisoned: {err}")))?;

        if guard.is_none() {
            *guard = Some(self.init_model()?);
        }
        let model = guard.as_mut().ok_or_else(|| {
            EmbedError::Failed("model missing after initialization".to_string())
        })?;

        let embeddings = model
            .embed(vec![text], None)
            .map_err(|err| EmbedError::Failed(err.to_string()))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::Failed("no embedding returned".to_string()))
    }
}
