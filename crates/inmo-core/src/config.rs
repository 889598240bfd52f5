use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{InmoError, Result};

/// Top-level configuration for the inmo service.
///
/// Loaded from `~/.inmo/config.toml` by default. Each section corresponds
/// to one component of the chat pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InmoConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub vocabulary: VocabularyConfig,
}

impl InmoConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: InmoConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Apply overrides from process environment variables.
    ///
    /// `GEMINI_API_KEYS` (comma-separated), `GEMINI_ENDPOINT` and
    /// `WORKING_MODEL` replace the corresponding gateway settings when set.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(keys) = lookup("GEMINI_API_KEYS") {
            let parsed: Vec<String> = keys
                .split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect();
            if !parsed.is_empty() {
                self.gateway.api_keys = parsed;
            }
        }
        if let Some(endpoint) = lookup("GEMINI_ENDPOINT").filter(|v| !v.trim().is_empty()) {
            self.gateway.endpoint = endpoint;
        }
        if let Some(model) = lookup("WORKING_MODEL").filter(|v| !v.trim().is_empty()) {
            self.gateway.model = model;
        }
    }
}

/// General service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// HTTP port.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.inmo/data".to_string(),
            log_level: "info".to_string(),
            port: 8000,
        }
    }
}

/// Listing store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file name, relative to `general.data_dir`.
    pub db_file: String,
    /// JSON listings feed loaded when the store is empty at startup.
    pub feed_path: Option<String>,
    /// Maximum number of listings a single query returns.
    pub result_limit: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_file: "inmo.db".to_string(),
            feed_path: Some("properties.json".to_string()),
            result_limit: 50,
        }
    }
}

/// Query cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Time-to-live of a cached result set, in seconds.
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { ttl_secs: 300 }
    }
}

/// Chat pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Number of recent user messages included as context.
    pub history_window: usize,
    /// Maximum accepted message length in characters.
    pub max_message_length: usize,
    /// Maximum listings enumerated in a generation request.
    pub max_listings_in_prompt: usize,
    /// Description preview length per enumerated listing.
    pub description_preview_chars: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_window: 3,
            max_message_length: 1000,
            max_listings_in_prompt: 6,
            description_preview_chars: 60,
        }
    }
}

/// Completion gateway configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the models API, ending in `/models/`.
    pub endpoint: String,
    /// Model name.
    pub model: String,
    /// Interchangeable credentials, tried in order.
    pub api_keys: Vec<String>,
    /// Per-attempt timeout in seconds.
    pub timeout_secs: u64,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1/models/".to_string(),
            model: "gemini-2.0-flash-001".to_string(),
            api_keys: vec![],
            timeout_secs: 30,
            temperature: 0.7,
            top_p: 0.8,
            top_k: 40,
        }
    }
}

// Credentials never reach logs.
impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_keys", &format!("[{} redacted]", self.api_keys.len()))
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("top_k", &self.top_k)
            .finish()
    }
}

/// A keyword and the canonical value it maps to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordMapping {
    pub keyword: String,
    pub canonical: String,
}

impl KeywordMapping {
    pub fn new(keyword: &str, canonical: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            canonical: canonical.to_string(),
        }
    }
}

/// Known vocabulary for filter extraction.
///
/// Order is significant: the first matching entry wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularyConfig {
    pub neighborhoods: Vec<String>,
    pub property_kinds: Vec<KeywordMapping>,
    pub operations: Vec<KeywordMapping>,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        let neighborhoods = [
            "palermo", "recoleta", "belgrano", "almagro", "caballito", "microcentro",
            "balvanera", "villa crespo", "san telmo", "boca", "nuñez", "monserrat",
            "constitución", "flores", "parque chas", "villa urquiza", "boedo", "villa luro",
            "villa devoto", "villa soldati", "villa ramos mejía", "liniers", "mataderos",
            "velez sarsfield", "versalles", "paternal", "chacarita", "agronomia",
            "villa pueyrredón", "saavedra", "coghlan", "belgrano r", "belgrano c", "olivos",
            "san isidro", "vicente lopez", "puerto madero", "colegiales", "soho",
            "barrio norte",
        ];

        Self {
            neighborhoods: neighborhoods.iter().map(|n| n.to_string()).collect(),
            property_kinds: vec![
                KeywordMapping::new("departamento", "departamento"),
                KeywordMapping::new("depto", "departamento"),
                KeywordMapping::new("casaquinta", "casaquinta"),
                KeywordMapping::new("casa", "casa"),
                KeywordMapping::new("ph", "ph"),
                KeywordMapping::new("terreno", "terreno"),
                KeywordMapping::new("lote", "terreno"),
                KeywordMapping::new("oficina", "oficina"),
            ],
            operations: vec![
                KeywordMapping::new("alquiler", "alquiler"),
                KeywordMapping::new("alquilar", "alquiler"),
                KeywordMapping::new("renta", "alquiler"),
                KeywordMapping::new("venta", "venta"),
                KeywordMapping::new("comprar", "venta"),
                KeywordMapping::new("compra", "venta"),
                KeywordMapping::new("vender", "venta"),
            ],
        }
    }
}

impl VocabularyConfig {
    /// Whether `term` is a property-kind or operation keyword.
    pub fn is_kind_or_operation_keyword(&self, term: &str) -> bool {
        let term = term.trim().to_lowercase();
        self.property_kinds
            .iter()
            .chain(self.operations.iter())
            .any(|m| m.keyword.to_lowercase() == term)
    }
}
