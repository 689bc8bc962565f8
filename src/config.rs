use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use homedir::my_home;
use serde::{Deserialize, Serialize};

use crate::semantic::{
    EmbeddingProvider, EngineOptions, FastEmbedProvider, HashingEmbedder, DEFAULT_BATCH_SIZE,
    DEFAULT_K, DEFAULT_MODEL,
};

const CONFIG_FILE: &str = "config.yaml";

/// Default bundle directory name under the base path
const DEFAULT_BUNDLE_DIR: &str = "bundle";

/// Default vector size for the hashing embedder
const DEFAULT_HASHING_DIMENSIONS: usize = 256;

/// Upper bound for `default_k`
const MAX_K: usize = 50;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Embedding model name (e.g. "paraphrase-multilingual-MiniLM-L12-v2"),
    /// or "hashing" / "hashing-<dims>" for the model-free embedder
    #[serde(default = "default_model")]
    pub model: String,

    /// Recommendations returned when a query does not ask for a count
    #[serde(default = "default_k")]
    pub default_k: usize,

    /// Parallelism for embedding generation: "auto" or a positive integer
    #[serde(default = "default_embedding_parallelism")]
    pub embedding_parallelism: String,

    /// Synopses per embedding call during build
    #[serde(default = "default_embedding_batch_size")]
    pub embedding_batch_size: usize,

    /// Vector size used when `model` is plain "hashing"
    #[serde(default = "default_hashing_dimensions")]
    pub hashing_dimensions: usize,

    #[serde(default = "default_show_download_progress")]
    pub show_download_progress: bool,

    /// Bundle directory; relative paths resolve against the base path
    #[serde(default)]
    pub bundle_path: Option<String>,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: default_model(),
            default_k: default_k(),
            embedding_parallelism: default_embedding_parallelism(),
            embedding_batch_size: default_embedding_batch_size(),
            hashing_dimensions: default_hashing_dimensions(),
            show_download_progress: default_show_download_progress(),
            bundle_path: None,
            base_path: PathBuf::new(),
        }
    }
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_k() -> usize {
    DEFAULT_K
}

fn default_embedding_parallelism() -> String {
    "auto".to_string()
}

fn default_embedding_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_hashing_dimensions() -> usize {
    DEFAULT_HASHING_DIMENSIONS
}

fn default_show_download_progress() -> bool {
    true
}

impl Config {
    /// `$ANIREC_BASE_PATH`, or `~/.local/share/anirec`.
    pub fn default_base_path() -> anyhow::Result<PathBuf> {
        if let Ok(path) = std::env::var("ANIREC_BASE_PATH") {
            return Ok(PathBuf::from(path));
        }
        let home = my_home()
            .context("Could not determine home directory")?
            .context("Home directory path is empty")?;
        Ok(home.join(".local/share/anirec"))
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.model.trim().is_empty() {
            bail!("model must not be empty");
        }

        if !(1..=MAX_K).contains(&self.default_k) {
            bail!("default_k must be between 1 and {MAX_K}, got {}", self.default_k);
        }

        // validate embedding_parallelism: "auto" or positive integer
        if self.embedding_parallelism != "auto" {
            match self.embedding_parallelism.parse::<u32>() {
                Ok(0) | Err(_) => bail!(
                    "embedding_parallelism must be 'auto' or a positive integer, got '{}'",
                    self.embedding_parallelism
                ),
                Ok(_) => {}
            }
        }

        if self.embedding_batch_size == 0 {
            bail!("embedding_batch_size must be greater than 0");
        }

        if self.hashing_dimensions == 0 || self.hashing_dimensions > usize::from(u16::MAX) {
            bail!(
                "hashing_dimensions must be between 1 and {}, got {}",
                u16::MAX,
                self.hashing_dimensions
            );
        }

        Ok(())
    }

    /// Load `config.yaml` from `base_path`, creating it with defaults if missing.
    pub fn load_with(base_path: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(base_path).with_context(|| {
            format!("Failed to create base directory {}", base_path.display())
        })?;

        let path = base_path.join(CONFIG_FILE);

        // create new if does not exist
        if !path.exists() {
            let mut config = Self::default();
            config.base_path = base_path.to_path_buf();
            config.save()?;
        }

        let config_str = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let mut config: Self = serde_yml::from_str(&config_str)
            .with_context(|| format!("{} is malformed", path.display()))?;

        config.base_path = base_path.to_path_buf();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = self.base_path.join(CONFIG_FILE);
        let temp_path = self.base_path.join(format!("{CONFIG_FILE}.tmp"));

        let config_str = serde_yml::to_string(&self)?;
        std::fs::write(&temp_path, config_str)
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        std::fs::rename(&temp_path, &path)?;
        Ok(())
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn bundle_dir(&self) -> PathBuf {
        match &self.bundle_path {
            Some(path) => self.base_path.join(path),
            None => self.base_path.join(DEFAULT_BUNDLE_DIR),
        }
    }

    /// Embedding threads; 0 means automatic.
    pub fn parallelism(&self) -> usize {
        self.embedding_parallelism.parse().unwrap_or(0)
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            embedding_parallelism: self.parallelism(),
            batch_size: self.embedding_batch_size,
        }
    }

    /// Instantiate the configured embedding provider.
    ///
    /// The provider is never persisted; loading a bundle re-creates it from the
    /// model name alone.
    pub fn embedding_provider(&self) -> anyhow::Result<Box<dyn EmbeddingProvider>> {
        if let Some(hashing) = HashingEmbedder::parse(&self.model, self.hashing_dimensions) {
            return Ok(Box::new(hashing?));
        }

        log::info!("Initializing embedding model '{}'", self.model);
        let provider =
            FastEmbedProvider::new(&self.model, self.base_path.clone(), self.show_download_progress)
                .with_context(|| format!("Failed to initialize model '{}'", self.model))?;
        Ok(Box::new(provider))
    }
}
