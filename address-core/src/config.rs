//! # Configuração
//!
//! Parâmetros de treino (JSON, todos opcionais) e localização padrão do
//! diretório do modelo.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Variável de ambiente com o diretório do modelo.
pub const MODEL_DIR_ENV: &str = "ADDRESS_PARSER_DIR";

/// Diretório usado quando [`MODEL_DIR_ENV`] não está definida.
pub const DEFAULT_MODEL_DIR: &str = "/usr/local/share/address_parser";

/// Diretório do modelo: `$ADDRESS_PARSER_DIR` ou [`DEFAULT_MODEL_DIR`].
pub fn default_model_dir() -> PathBuf {
    match std::env::var_os(MODEL_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(DEFAULT_MODEL_DIR),
    }
}

/// Parâmetros do treino.
///
/// ```rust
/// use address_core::config::TrainerConfig;
///
/// let config = TrainerConfig::from_json_str(r#"{ "iterations": 10 }"#).unwrap();
/// assert_eq!(config.iterations, 10);
/// assert_eq!(config.min_vocab_count, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    /// Passadas sobre o corpus.
    pub iterations: usize,
    /// Ocorrências mínimas para uma palavra entrar no vocabulário.
    pub min_vocab_count: u32,
    /// Ocorrências mínimas para uma frase entrar no dicionário de componentes.
    pub min_phrase_count: u32,
    /// Embaralha a ordem dos exemplos a cada passada.
    pub shuffle: bool,
    /// Semente do embaralhamento.
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            iterations: 5,
            min_vocab_count: 5,
            min_phrase_count: 1,
            shuffle: true,
            seed: 42,
        }
    }
}

impl TrainerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
