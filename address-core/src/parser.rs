//! # Parser de Endereços
//!
//! Fachada que coordena os módulos do crate em uma chamada de parse:
//!
//! 1. Tokenização do endereço bruto ([`tokenize`]).
//! 2. Contexto: normalização, separadores e gazetteers ([`ParseContext`]).
//! 3. Decodificação gulosa com o perceptron médio ([`tag`]).
//! 4. Rótulos `sep`/`fsep` para os separadores e fusão das sequências de
//!    rótulos iguais em componentes ([`collapse_labels`]).
//!
//! Um [`AddressParser`] é imutável e `Send + Sync`: várias threads podem usar
//! o mesmo parser (ex: via `Arc`), cada uma com o seu [`ParseContext`].
//!
//! ## Exemplo de Uso
//!
//! ```rust,no_run
//! use address_core::parser::AddressParser;
//!
//! let parser = AddressParser::load("/usr/local/share/address_parser")?;
//! let result = parser.parse("123 Fake Street Brooklyn NY 12345", Some("en"), Some("us"))?;
//! for (component, value) in result.to_pairs() {
//!     println!("{component}: {value}");
//! }
//! # Ok::<(), address_core::errors::ParserError>(())
//! ```

use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::context::{Dictionaries, ParseContext};
use crate::corpus::TrainingExample;
use crate::errors::Result;
use crate::gazetteer::{DictionaryKind, Gazetteers};
use crate::model::AddressParserModel;
use crate::perceptron::tag;
use crate::tagger::{collapse_labels, ParseResult};
use crate::tokenizer::{tokenize, Token};

/// O parser: modelo treinado + dicionários externos opcionais.
#[derive(Debug, Clone, Default)]
pub struct AddressParser {
    model: AddressParserModel,
    gazetteers: Gazetteers,
}

impl AddressParser {
    pub fn new(model: AddressParserModel) -> Self {
        Self::with_gazetteers(model, Gazetteers::new())
    }

    pub fn with_gazetteers(model: AddressParserModel, gazetteers: Gazetteers) -> Self {
        Self { model, gazetteers }
    }

    /// Carrega o modelo de `dir`.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(AddressParserModel::load(dir)?))
    }

    pub fn load_with_gazetteers(dir: impl AsRef<Path>, gazetteers: Gazetteers) -> Result<Self> {
        Ok(Self::with_gazetteers(AddressParserModel::load(dir)?, gazetteers))
    }

    pub fn save(&self, dir: impl AsRef<Path>) -> Result<()> {
        self.model.save(dir)
    }

    pub fn model(&self) -> &AddressParserModel {
        &self.model
    }

    pub fn gazetteers(&self) -> &Gazetteers {
        &self.gazetteers
    }

    /// Vocabulário e dicionários que alimentam o contexto.
    pub fn dictionaries(&self) -> Dictionaries<'_> {
        Dictionaries::new(self.model.vocab())
            .with_gazetteers(&self.gazetteers)
            .with_store(DictionaryKind::Component, self.model.phrase_types())
    }

    /// Faz o parse de um endereço.
    ///
    /// `language` e `country` são tags opcionais (ex: "en", "us"); tags
    /// inválidas são ignoradas.
    pub fn parse(&self, address: &str, language: Option<&str>, country: Option<&str>) -> Result<ParseResult> {
        let mut ctx = ParseContext::new();
        self.parse_with_context(address, language, country, &mut ctx)
    }

    /// Como [`AddressParser::parse`], reaproveitando um contexto.
    pub fn parse_with_context(
        &self,
        address: &str,
        language: Option<&str>,
        country: Option<&str>,
        ctx: &mut ParseContext,
    ) -> Result<ParseResult> {
        let tokens = tokenize(address);
        self.parse_tokens(address, &tokens, language, country, ctx)
    }

    /// Parse a partir de tokens já produzidos pelo chamador. Os offsets dos
    /// tokens devem apontar para `address` para que os valores sejam
    /// recortados do texto original; caso contrário usa o texto dos tokens.
    pub fn parse_tokens(
        &self,
        address: &str,
        tokens: &[Token],
        language: Option<&str>,
        country: Option<&str>,
        ctx: &mut ParseContext,
    ) -> Result<ParseResult> {
        ctx.fill(tokens, language, country, &self.dictionaries());
        if ctx.is_empty() {
            return Ok(ParseResult::default());
        }

        let words = tag(self.model.perceptron(), ctx);
        let labels = ctx.token_labels(&words)?;
        collapse_labels(address, &ctx.tokens, &labels)
    }

    /// Avalia o parser sobre exemplos rotulados, em paralelo.
    pub fn evaluate(&self, examples: &[TrainingExample]) -> Evaluation {
        let dictionaries = self.dictionaries();
        examples
            .par_iter()
            .map_init(ParseContext::new, |ctx, example| {
                example.fill_context(ctx, &dictionaries);
                let Some(gold) = example.gold_labels(ctx) else {
                    return Evaluation::default();
                };
                let predicted = tag(self.model.perceptron(), ctx);
                let correct = predicted.iter().zip(&gold).filter(|(p, g)| p == g).count();
                Evaluation {
                    examples: 1,
                    tokens: gold.len(),
                    correct,
                    exact: usize::from(correct == gold.len()),
                }
            })
            .reduce(Evaluation::default, Evaluation::merge)
    }
}

/// Resultado de [`AddressParser::evaluate`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evaluation {
    pub examples: usize,
    pub tokens: usize,
    /// Palavras com o componente correto.
    pub correct: usize,
    /// Exemplos sem nenhum erro.
    pub exact: usize,
}

impl Evaluation {
    pub fn accuracy(&self) -> f64 {
        if self.tokens == 0 {
            return 0.0;
        }
        self.correct as f64 / self.tokens as f64
    }

    pub fn exact_match_rate(&self) -> f64 {
        if self.examples == 0 {
            return 0.0;
        }
        self.exact as f64 / self.examples as f64
    }

    fn merge(self, other: Self) -> Self {
        Self {
            examples: self.examples + other.examples,
            tokens: self.tokens + other.tokens,
            correct: self.correct + other.correct,
            exact: self.exact + other.exact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tagger::{AddressComponent, Label};
    use crate::test_utils::{sample_examples, trained_parser};
    use std::fs;
    use AddressComponent::*;

    #[test]
    fn test_parse_us_address() {
        let parser = trained_parser();
        let result = parser
            .parse("123 Fake Street Brooklyn NY 12345", Some("en"), Some("us"))
            .unwrap();
        assert_eq!(
            result.to_pairs(),
            vec![
                ("house_number", "123"),
                ("road", "Fake Street"),
                ("city", "Brooklyn"),
                ("state", "NY"),
                ("postcode", "12345"),
            ]
        );
    }

    #[test]
    fn test_field_separators_never_emitted() {
        let parser = trained_parser();
        let result = parser
            .parse("123 Fake Street, Brooklyn, NY", Some("en"), Some("us"))
            .unwrap();
        for component in &result {
            assert!(AddressComponent::from_name(component.name()).is_some());
            assert!(!component.value.contains(','));
            assert_ne!(component.name(), Label::SEPARATOR);
            assert_ne!(component.name(), Label::FIELD_SEPARATOR);
        }
        assert_eq!(result.get(Road), Some("Fake Street"));
        assert_eq!(result.get(City), Some("Brooklyn"));
    }

    #[test]
    fn test_out_of_vocabulary_road() {
        let parser = trained_parser();
        let result = parser
            .parse("456 Maple Avenue Brooklyn NY 11201", Some("en"), Some("us"))
            .unwrap();
        assert_eq!(result.get(HouseNumber), Some("456"));
        assert_eq!(result.get(Road), Some("Maple Avenue"));
    }

    #[test]
    fn test_value_keeps_original_spelling() {
        let parser = trained_parser();
        let result = parser.parse("12 Cherry St., Brooklyn", Some("en"), Some("us")).unwrap();
        assert!(result.get(Road).unwrap().starts_with("Cherry"));
        assert!(result.iter().any(|c| c.value.contains("St.")), "{result:?}");
    }

    #[test]
    fn test_parse_is_deterministic() {
        let parser = trained_parser();
        let address = "77 Lake Shore Drive Chicago IL 60611";
        let first = parser.parse(address, Some("en"), Some("us")).unwrap();
        let mut ctx = ParseContext::new();
        for _ in 0..5 {
            assert_eq!(parser.parse_with_context(address, Some("en"), Some("us"), &mut ctx).unwrap(), first);
        }
    }

    #[test]
    fn test_empty_address() {
        let parser = trained_parser();
        assert!(parser.parse("", None, None).unwrap().is_empty());
        assert!(parser.parse("   \t ", Some("en"), None).unwrap().is_empty());
        assert!(parser.parse(" , . ", Some("en"), None).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_tags_still_parse() {
        let parser = trained_parser();
        let result = parser
            .parse("123 Fake Street Brooklyn NY 12345", Some("english!"), Some(""))
            .unwrap();
        assert!(!result.is_empty());
    }

    #[test]
    fn test_parse_tokens_from_caller() {
        let parser = trained_parser();
        let address = "123 Fake Street Brooklyn NY 12345";
        let tokens = tokenize(address);
        let mut ctx = ParseContext::new();
        let from_tokens = parser
            .parse_tokens(address, &tokens, Some("en"), Some("us"), &mut ctx)
            .unwrap();
        assert_eq!(from_tokens, parser.parse(address, Some("en"), Some("us")).unwrap());
    }

    #[test]
    fn test_untrained_parser_still_answers() {
        let parser = AddressParser::default();
        let result = parser.parse("Brooklyn", None, None).unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_concurrent_parsing() {
        let parser = trained_parser();
        let addresses = [
            "123 Fake Street Brooklyn NY 12345",
            "640 Willow Avenue, Chicago, IL",
            "9 Pine Road Albany NY 12207",
        ];
        let expected: Vec<ParseResult> = addresses
            .iter()
            .map(|a| parser.parse(a, Some("en"), Some("us")).unwrap())
            .collect();

        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        let mut ctx = ParseContext::new();
                        addresses
                            .iter()
                            .map(|a| parser.parse_with_context(a, Some("en"), Some("us"), &mut ctx).unwrap())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), expected);
            }
        });
    }

    #[test]
    fn test_persistence_roundtrip() {
        let parser = trained_parser();
        let dir = tempfile::tempdir().unwrap();
        parser.save(dir.path()).unwrap();
        let loaded = AddressParser::load(dir.path()).unwrap();

        for address in ["123 Fake Street Brooklyn NY 12345", "3 Ash Road, Boston, MA"] {
            assert_eq!(
                loaded.parse(address, Some("en"), Some("us")).unwrap(),
                parser.parse(address, Some("en"), Some("us")).unwrap()
            );
        }

        let again = tempfile::tempdir().unwrap();
        loaded.save(again.path()).unwrap();
        for name in [crate::model::WEIGHTS_FILE, crate::model::VOCAB_FILE, crate::model::PHRASES_FILE] {
            assert_eq!(
                fs::read(dir.path().join(name)).unwrap(),
                fs::read(again.path().join(name)).unwrap()
            );
        }
    }

    #[test]
    fn test_load_fails_on_partial_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AddressParser::load(dir.path()).is_err());

        trained_parser().save(dir.path()).unwrap();
        fs::write(dir.path().join(crate::model::WEIGHTS_FILE), b"APWT\x01\x00\x00\x00lixo").unwrap();
        assert!(AddressParser::load(dir.path()).is_err());
    }

    #[test]
    fn test_evaluate_on_training_data() {
        let parser = trained_parser();
        let examples = sample_examples();
        let evaluation = parser.evaluate(&examples);
        assert_eq!(evaluation.examples, examples.len());
        assert!(evaluation.tokens > 0);
        assert!(evaluation.accuracy() > 0.9, "{evaluation:?}");
    }

    #[test]
    fn test_geodb_gazetteer_is_consulted() {
        use crate::dictionary::{PhraseTypes, PhraseTypesTrie};
        use std::sync::Arc;

        let mut geodb = PhraseTypesTrie::new();
        geodb.insert("springfield", PhraseTypes::single(City));
        let parser = AddressParser::with_gazetteers(
            trained_parser().model().clone(),
            Gazetteers::new().with_geodb(Arc::new(geodb)),
        );

        let mut ctx = ParseContext::new();
        parser
            .parse_with_context("10 Elm Street Springfield", Some("en"), Some("us"), &mut ctx)
            .unwrap();
        assert_eq!(ctx.resolved[3], Some(City));
    }
}
