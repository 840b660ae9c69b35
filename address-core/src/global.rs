//! # Parser Global
//!
//! Acesso ao parser no nível do processo, para quem não quer manter um
//! [`AddressParser`] próprio:
//!
//! ```rust,no_run
//! use address_core::global;
//!
//! global::setup_default()?;
//! let result = global::parse("123 Fake Street Brooklyn NY 12345", Some("en"), Some("us"))?;
//! global::teardown();
//! # Ok::<(), address_core::errors::ParserError>(())
//! ```
//!
//! `setup` e `teardown` são idempotentes. Chamadas de parse antes do `setup`
//! (ou depois do `teardown`) devolvem [`ParserError::NotInitialized`].

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;
use tracing::{debug, info};

use crate::config::default_model_dir;
use crate::errors::{ParserError, Result};
use crate::parser::AddressParser;
use crate::tagger::ParseResult;

static PARSER: Lazy<RwLock<Option<Arc<AddressParser>>>> = Lazy::new(|| RwLock::new(None));

/// Carrega o modelo de `dir`. Não recarrega se já houver um parser ativo.
pub fn setup(dir: impl AsRef<Path>) -> Result<()> {
    let mut slot = PARSER.write().unwrap_or_else(PoisonError::into_inner);
    if slot.is_some() {
        debug!("parser global já carregado");
        return Ok(());
    }
    let parser = AddressParser::load(dir.as_ref())?;
    *slot = Some(Arc::new(parser));
    info!(dir = %dir.as_ref().display(), "parser global inicializado");
    Ok(())
}

/// [`setup`] com o diretório padrão (ver [`default_model_dir`]).
pub fn setup_default() -> Result<()> {
    setup(default_model_dir())
}

/// Libera o parser global. Parsers já obtidos continuam válidos.
pub fn teardown() {
    let mut slot = PARSER.write().unwrap_or_else(PoisonError::into_inner);
    if slot.take().is_some() {
        info!("parser global liberado");
    }
}

pub fn is_loaded() -> bool {
    PARSER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .is_some()
}

/// O parser global, para uso repetido sem travar a cada chamada.
pub fn address_parser() -> Result<Arc<AddressParser>> {
    PARSER
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
        .ok_or(ParserError::NotInitialized)
}

/// Parse com o parser global.
pub fn parse(address: &str, language: Option<&str>, country: Option<&str>) -> Result<ParseResult> {
    address_parser()?.parse(address, language, country)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::trained_parser;

    // Estado global: todo o ciclo de vida fica em um único teste.
    #[test]
    fn test_global_lifecycle() {
        assert!(!is_loaded());
        assert!(matches!(
            parse("123 Fake Street", None, None),
            Err(ParserError::NotInitialized)
        ));

        let missing = tempfile::tempdir().unwrap();
        assert!(setup(missing.path()).is_err());
        assert!(!is_loaded());

        let dir = tempfile::tempdir().unwrap();
        trained_parser().save(dir.path()).unwrap();
        setup(dir.path()).unwrap();
        let first = address_parser().unwrap();
        // idempotente: não recarrega
        setup(missing.path()).unwrap();
        assert!(Arc::ptr_eq(&first, &address_parser().unwrap()));

        let address = "123 Fake Street Brooklyn NY 12345";
        assert_eq!(
            parse(address, Some("en"), Some("us")).unwrap(),
            trained_parser().parse(address, Some("en"), Some("us")).unwrap()
        );

        teardown();
        teardown();
        assert!(!is_loaded());
        assert!(matches!(address_parser(), Err(ParserError::NotInitialized)));
        // o Arc obtido antes continua utilizável
        assert!(first.parse(address, None, None).is_ok());
    }
}
