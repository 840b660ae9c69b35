//! # Tipos de Erro
//!
//! Apenas falhas estruturais viram erro: arquivos de modelo ausentes ou
//! corrompidos, registros de treino malformados, esgotamento de memória ao
//! montar a resposta. Falhas de lookup (palavra fora do vocabulário, frase
//! ausente do dicionário) nunca são erros; degradam para "sem pertinência".

use std::collections::TryReserveError;
use std::path::PathBuf;

/// `Result` do crate, com [`ParserError`] como erro padrão.
pub type Result<T, E = ParserError> = std::result::Result<T, E>;

/// Erros que o parser de endereços pode reportar.
#[derive(Debug, thiserror::Error)]
pub enum ParserError {
    /// Um dos arquivos obrigatórios do diretório do modelo não existe.
    #[error("arquivo de modelo ausente: {}", .0.display())]
    MissingFile(PathBuf),

    /// O arquivo existe mas o conteúdo não passa na validação estrutural.
    #[error("arquivo de modelo corrompido {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Erro de E/S ao ler ou gravar o modelo.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Violação do invariante de [`PhraseTypes`](crate::dictionary::PhraseTypes).
    #[error("tipos de frase inválidos: {0}")]
    InvalidPhraseTypes(String),

    /// Registro de treino malformado (a linha é descartada, o treino continua).
    #[error("exemplo de treino inválido na linha {line}: {reason}")]
    TrainingExample { line: usize, reason: String },

    /// Nenhum exemplo de treino utilizável.
    #[error("corpus de treino vazio")]
    EmptyCorpus,

    /// Falha de alocação ao montar a resposta do parse.
    #[error("memória insuficiente para montar a resposta: {0}")]
    Allocation(#[from] TryReserveError),

    /// O acessor global foi usado antes de `setup`.
    #[error("parser de endereços não inicializado (chame setup antes)")]
    NotInitialized,

    /// Configuração de treino inválida.
    #[error("configuração inválida: {0}")]
    Config(#[from] serde_json::Error),
}

impl ParserError {
    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        ParserError::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn training(line: usize, reason: impl Into<String>) -> Self {
        ParserError::TrainingExample {
            line,
            reason: reason.into(),
        }
    }
}
