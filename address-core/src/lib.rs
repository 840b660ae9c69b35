//! # address-core — Parser Estatístico de Endereços Postais
//!
//! Este crate transforma endereços em texto livre, em vários idiomas, em
//! componentes rotulados (número, rua, bairro, cidade, estado, código postal,
//! país, ...) usando um **perceptron médio** decodificado de forma gulosa e
//! dicionários de frases (gazetteers).
//!
//! ## Arquitetura do Sistema
//!
//! O dado flui em pipeline linear:
//!
//! 1.  **Entrada**: endereço bruto (`&str`) + tags opcionais de idioma e país.
//! 2.  **Tokenização** ([`tokenizer`]): tokens com classe léxica e offsets no original.
//! 3.  **Contexto** ([`context`]): normalização ([`normalize`]), separadores,
//!     vocabulário e casamento de frases ([`gazetteer`], [`dictionary`]).
//! 4.  **Features** ([`features`]): strings esparsas por palavra, dependentes dos
//!     dois rótulos anteriores.
//! 5.  **Decodificação** ([`perceptron`]): argmax guloso, palavra a palavra.
//! 6.  **Saída** ([`tagger`]): [`ParseResult`] com um componente por sequência
//!     de rótulos iguais, texto recortado do endereço original.
//!
//! O treino ([`trainer`], [`corpus`], [`config`]) produz um
//! [`AddressParserModel`] que é gravado e carregado de um diretório
//! ([`model`]).
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use address_core::{AddressParserTrainer, TrainerConfig};
//!
//! let corpus = "en\tus\t123/house_number Fake/road Street/road Brooklyn/city\n\
//!               en\tus\t9/house_number Elm/road Street/road Brooklyn/city\n";
//! let config = TrainerConfig { min_vocab_count: 1, ..TrainerConfig::default() };
//! let (parser, report) = AddressParserTrainer::new(config)
//!     .train_from_reader(corpus.as_bytes())
//!     .unwrap();
//! assert_eq!(report.examples, 2);
//!
//! let result = parser.parse("7 Elm Street Brooklyn", Some("en"), Some("us")).unwrap();
//! for component in &result {
//!     println!("{}: {}", component.name(), component.value);
//! }
//! ```
//!
//! ## Módulos Principais
//!
//! - [`parser`]: fachada de parse, carga/gravação e avaliação.
//! - [`global`]: parser único do processo (`setup` / `parse` / `teardown`).
//! - [`errors`]: o tipo [`ParserError`].

pub mod config;
pub mod context;
pub mod corpus;
pub mod dictionary;
pub mod errors;
pub mod features;
pub mod gazetteer;
pub mod global;
pub mod model;
pub mod normalize;
pub mod parser;
pub mod perceptron;
pub mod tagger;
pub mod tokenizer;
pub mod trainer;

#[cfg(test)]
mod test_utils;

pub use config::TrainerConfig;
pub use context::ParseContext;
pub use corpus::TrainingExample;
pub use dictionary::{PhraseDictionary, PhraseTypes, PhraseTypesTrie, Trie};
pub use errors::{ParserError, Result};
pub use gazetteer::{DictionaryKind, Gazetteers};
pub use model::AddressParserModel;
pub use parser::{AddressParser, Evaluation};
pub use tagger::{AddressComponent, Label, ParseResult, ParsedComponent};
pub use tokenizer::{Token, TokenKind};
pub use trainer::{AddressParserTrainer, TrainingReport};
