use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ArError, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub rerank: RerankConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    pub fn load(explicit_path: Option<&Path>, root: &Path) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| std::env::var("AREC_CONFIG").ok().map(PathBuf::from));

        if let Some(path) = explicit {
            if let Some(patch) = Self::load_patch(&path)? {
                config.merge_patch(patch);
            }
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_project(root)? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("arec/config.toml"))
    }

    fn load_project(root: &Path) -> Result<Option<ConfigPatch>> {
        Self::load_patch(&root.join("config.toml"))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| ArError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| ArError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.catalog {
            self.catalog.merge(patch);
        }
        if let Some(patch) = patch.embedding {
            self.embedding.merge(patch);
        }
        if let Some(patch) = patch.retrieval {
            self.retrieval.merge(patch);
        }
        if let Some(patch) = patch.rerank {
            self.rerank.merge(patch);
        }
        if let Some(patch) = patch.generation {
            self.generation.merge(patch);
        }
        if let Some(patch) = patch.query {
            self.query.merge(patch);
        }
        if let Some(patch) = patch.server {
            self.server.merge(patch);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_string("AREC_CATALOG_PATH") {
            self.catalog.path = Some(PathBuf::from(value));
        }
        if let Some(value) = env_string("AREC_INDEX_PATH") {
            self.catalog.index_path = Some(PathBuf::from(value));
        }

        if let Some(value) = env_string("AREC_EMBEDDING_BACKEND") {
            self.embedding.backend = value;
        }
        if let Some(value) = env_u32("AREC_EMBEDDING_DIMS")? {
            self.embedding.dims = value;
        }
        if let Some(value) = env_u32("AREC_EMBEDDING_MAX_TOKENS")? {
            self.embedding.max_tokens = value;
        }

        if let Some(value) = env_u32("AREC_RETRIEVAL_TOP_K")? {
            self.retrieval.top_k = value;
        }

        if let Some(value) = env_u32("AREC_RERANK_MIN_RESULTS")? {
            self.rerank.min_results = value;
        }
        if let Some(value) = env_u32("AREC_RERANK_MAX_RESULTS")? {
            self.rerank.max_results = value;
        }
        if let Some(value) = env_u32("AREC_RERANK_CACHE_SIZE")? {
            self.rerank.cache_size = value;
        }

        if let Some(value) = env_string("AREC_GENERATION_BACKEND") {
            self.generation.backend = value;
        }
        if let Some(value) = env_string("AREC_GENERATION_ENDPOINT") {
            self.generation.endpoint = value;
        }
        if let Some(value) = env_string("AREC_GENERATION_MODEL") {
            self.generation.model = value;
        }
        if let Some(value) = env_string("AREC_GENERATION_API_KEY_ENV") {
            self.generation.api_key_env = value;
        }
        if let Some(value) = env_u64("AREC_GENERATION_TIMEOUT_SECS")? {
            self.generation.timeout_secs = value;
        }
        if let Some(value) = env_f32("AREC_GENERATION_TEMPERATURE")? {
            self.generation.temperature = value;
        }
        if let Some(value) = env_u32("AREC_GENERATION_MAX_TOKENS")? {
            self.generation.max_tokens = value;
        }

        if let Some(value) = env_bool("AREC_QUERY_FETCH_URLS") {
            self.query.fetch_urls = value;
        }
        if let Some(value) = env_u64("AREC_QUERY_FETCH_TIMEOUT_SECS")? {
            self.query.fetch_timeout_secs = value;
        }

        if let Some(value) = env_string("AREC_SERVER_BIND") {
            self.server.bind = value;
        }
        if let Some(value) = env_u64("AREC_SERVER_IO_TIMEOUT_SECS")? {
            self.server.io_timeout_secs = value;
        }

        Ok(())
    }

    /// Reject combinations the pipeline cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.embedding.dims == 0 {
            return Err(ArError::Config(
                "embedding.dims must be greater than 0".to_string(),
            ));
        }
        if self.embedding.max_tokens == 0 {
            return Err(ArError::Config(
                "embedding.max_tokens must be greater than 0".to_string(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(ArError::Config(
                "retrieval.top_k must be greater than 0".to_string(),
            ));
        }
        if self.rerank.min_results == 0 || self.rerank.min_results > self.rerank.max_results {
            return Err(ArError::Config(format!(
                "rerank bounds invalid: min_results={} max_results={} (need 1 <= min <= max)",
                self.rerank.min_results, self.rerank.max_results
            )));
        }
        if self.server.io_timeout_secs == 0 {
            return Err(ArError::Config(
                "server.io_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ArError::Config(format!(
                "generation.temperature {} out of range 0.0..=2.0",
                self.generation.temperature
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Catalog source file used by `arec build` when --catalog is omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    /// Index database location; defaults to `<root>/index.db`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_path: Option<PathBuf>,
}

impl CatalogConfig {
    fn merge(&mut self, patch: CatalogPatch) {
        if let Some(value) = patch.path {
            self.path = Some(value);
        }
        if let Some(value) = patch.index_path {
            self.index_path = Some(value);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub backend: String,
    #[serde(default)]
    pub dims: u32,
    #[serde(default)]
    pub max_tokens: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: "hash".to_string(),
            dims: 384,
            max_tokens: 256,
        }
    }
}

impl EmbeddingConfig {
    fn merge(&mut self, patch: EmbeddingPatch) {
        if let Some(value) = patch.backend {
            self.backend = value;
        }
        if let Some(value) = patch.dims {
            self.dims = value;
        }
        if let Some(value) = patch.max_tokens {
            self.max_tokens = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default)]
    pub top_k: u32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 20 }
    }
}

impl RetrievalConfig {
    fn merge(&mut self, patch: RetrievalPatch) {
        if let Some(value) = patch.top_k {
            self.top_k = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    #[serde(default)]
    pub min_results: u32,
    #[serde(default)]
    pub max_results: u32,
    /// Exact-match memo entries; 0 disables the memo.
    #[serde(default)]
    pub cache_size: u32,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            min_results: 5,
            max_results: 10,
            cache_size: 128,
        }
    }
}

impl RerankConfig {
    fn merge(&mut self, patch: RerankPatch) {
        if let Some(value) = patch.min_results {
            self.min_results = value;
        }
        if let Some(value) = patch.max_results {
            self.max_results = value;
        }
        if let Some(value) = patch.cache_size {
            self.cache_size = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// `openai` (any OpenAI-compatible chat endpoint) or `heuristic` (offline).
    #[serde(default)]
    pub backend: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: String,
    #[serde(default)]
    pub timeout_secs: u64,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            backend: "openai".to_string(),
            endpoint: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            api_key_env: "GROQ_API_KEY".to_string(),
            timeout_secs: 30,
            temperature: 0.3,
            max_tokens: 4000,
        }
    }
}

impl GenerationConfig {
    fn merge(&mut self, patch: GenerationPatch) {
        if let Some(value) = patch.backend {
            self.backend = value;
        }
        if let Some(value) = patch.endpoint {
            self.endpoint = value;
        }
        if let Some(value) = patch.model {
            self.model = value;
        }
        if let Some(value) = patch.api_key_env {
            self.api_key_env = value;
        }
        if let Some(value) = patch.timeout_secs {
            self.timeout_secs = value;
        }
        if let Some(value) = patch.temperature {
            self.temperature = value;
        }
        if let Some(value) = patch.max_tokens {
            self.max_tokens = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    #[serde(default)]
    pub fetch_urls: bool,
    #[serde(default)]
    pub fetch_timeout_secs: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            fetch_urls: true,
            fetch_timeout_secs: 30,
        }
    }
}

impl QueryConfig {
    fn merge(&mut self, patch: QueryPatch) {
        if let Some(value) = patch.fetch_urls {
            self.fetch_urls = value;
        }
        if let Some(value) = patch.fetch_timeout_secs {
            self.fetch_timeout_secs = value;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub bind: String,
    /// Per-connection read/write timeout; idle clients are dropped after it.
    #[serde(default)]
    pub io_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8000".to_string(),
            io_timeout_secs: 30,
        }
    }
}

impl ServerConfig {
    fn merge(&mut self, patch: ServerPatch) {
        if let Some(value) = patch.bind {
            self.bind = value;
        }
        if let Some(value) = patch.io_timeout_secs {
            self.io_timeout_secs = value;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    catalog: Option<CatalogPatch>,
    embedding: Option<EmbeddingPatch>,
    retrieval: Option<RetrievalPatch>,
    rerank: Option<RerankPatch>,
    generation: Option<GenerationPatch>,
    query: Option<QueryPatch>,
    server: Option<ServerPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CatalogPatch {
    path: Option<PathBuf>,
    index_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct EmbeddingPatch {
    backend: Option<String>,
    dims: Option<u32>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RetrievalPatch {
    top_k: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RerankPatch {
    min_results: Option<u32>,
    max_results: Option<u32>,
    cache_size: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct GenerationPatch {
    backend: Option<String>,
    endpoint: Option<String>,
    model: Option<String>,
    api_key_env: Option<String>,
    timeout_secs: Option<u64>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct QueryPatch {
    fetch_urls: Option<bool>,
    fetch_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ServerPatch {
    bind: Option<String>,
    io_timeout_secs: Option<u64>,
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|value| {
        matches!(
            value.to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn env_u32(key: &str) -> Result<Option<u32>> {
    match std::env::var(key) {
        Ok(value) => value.parse::<u32>().map(Some).map_err(|err| {
            ArError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        Err(_) => Ok(None),
    }
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(value) => value.parse::<u64>().map(Some).map_err(|err| {
            ArError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        Err(_) => Ok(None),
    }
}

fn env_f32(key: &str) -> Result<Option<f32>> {
    match std::env::var(key) {
        Ok(value) => value.parse::<f32>().map(Some).map_err(|err| {
            ArError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // =========================================================================
    // Defaults
    // =========================================================================

    #[test]
    fn config_defaults_match_pipeline_constants() {
        let config = Config::default();
        assert_eq!(config.embedding.backend, "hash");
        assert_eq!(config.embedding.dims, 384);
        assert_eq!(config.retrieval.top_k, 20);
        assert_eq!(config.rerank.min_results, 5);
        assert_eq!(config.rerank.max_results, 10);
        assert_eq!(config.generation.model, "llama-3.1-8b-instant");
        assert_eq!(config.generation.api_key_env, "GROQ_API_KEY");
        assert!((config.generation.temperature - 0.3).abs() < f32::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_serialization_roundtrip() {
        let config = Config::default();
        let rendered = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.retrieval.top_k, config.retrieval.top_k);
        assert_eq!(parsed.generation.endpoint, config.generation.endpoint);
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn validate_rejects_zero_top_k() {
        let mut config = Config::default();
        config.retrieval.top_k = 0;
        assert!(matches!(config.validate(), Err(ArError::Config(_))));
    }

    #[test]
    fn validate_rejects_inverted_bounds() {
        let mut config = Config::default();
        config.rerank.min_results = 8;
        config.rerank.max_results = 4;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("min_results=8"));
    }

    #[test]
    fn validate_rejects_zero_io_timeout() {
        let mut config = Config::default();
        config.server.io_timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("io_timeout_secs"));
    }

    #[test]
    fn validate_rejects_zero_dims() {
        let mut config = Config::default();
        config.embedding.dims = 0;
        assert!(config.validate().is_err());
    }

    // =========================================================================
    // Patches
    // =========================================================================

    #[test]
    fn load_patch_nonexistent_file() {
        let result = Config::load_patch(Path::new("/nonexistent/path/config.toml")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn load_patch_partial_config() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[retrieval]\ntop_k = 15\n").unwrap();

        let patch = Config::load_patch(&path).unwrap().unwrap();
        assert_eq!(patch.retrieval.unwrap().top_k, Some(15));
        assert!(patch.generation.is_none());
    }

    #[test]
    fn load_patch_invalid_toml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "this is not valid toml [[[").unwrap();
        assert!(Config::load_patch(&path).is_err());
    }

    #[test]
    fn merge_patch_only_touches_given_fields() {
        let mut config = Config::default();
        config.merge_patch(ConfigPatch {
            generation: Some(GenerationPatch {
                backend: Some("heuristic".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });

        assert_eq!(config.generation.backend, "heuristic");
        assert_eq!(config.generation.timeout_secs, 30);
        assert_eq!(config.retrieval.top_k, 20);
    }

    // =========================================================================
    // Config::load
    // =========================================================================

    #[test]
    fn config_load_from_explicit_path() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("custom.toml");
        std::fs::write(
            &config_path,
            "[rerank]\nmax_results = 8\n[server]\nbind = \"0.0.0.0:9000\"\n",
        )
        .unwrap();

        let config = Config::load(Some(&config_path), temp.path()).unwrap();
        assert_eq!(config.rerank.max_results, 8);
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.server.io_timeout_secs, 30);
    }

    #[test]
    fn config_load_project_config() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("config.toml"),
            "[catalog]\nindex_path = \"/tmp/custom.db\"\n",
        )
        .unwrap();

        let config = Config::load(None, temp.path()).unwrap();
        assert_eq!(
            config.catalog.index_path.as_deref(),
            Some(Path::new("/tmp/custom.db"))
        );
    }

    #[test]
    fn config_load_rejects_invalid_values() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("bad.toml");
        std::fs::write(&config_path, "[rerank]\nmin_results = 0\n").unwrap();

        assert!(Config::load(Some(&config_path), temp.path()).is_err());
    }

    #[test]
    #[allow(unsafe_code)]
    fn env_u32_reports_key_and_value() {
        // SAFETY: key is unique to this test.
        unsafe { std::env::set_var("AREC_TEST_ENV_U32_BAD", "twenty") };
        let err = env_u32("AREC_TEST_ENV_U32_BAD").unwrap_err();
        unsafe { std::env::remove_var("AREC_TEST_ENV_U32_BAD") };

        let message = err.to_string();
        assert!(message.contains("AREC_TEST_ENV_U32_BAD"));
        assert!(message.contains("twenty"));
    }

    #[test]
    fn env_helpers_absent_key_is_none() {
        assert_eq!(env_u32("AREC_TEST_DEFINITELY_UNSET").unwrap(), None);
        assert_eq!(env_bool("AREC_TEST_DEFINITELY_UNSET"), None);
    }
}
