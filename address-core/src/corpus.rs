//! # Corpus de Treino de Endereços
//!
//! Leitura de endereços rotulados token a token e extração, a partir deles,
//! do vocabulário e do dicionário de frases de componentes.
//!
//! ## Formato
//!
//! Um registro por linha, três campos separados por TAB:
//!
//! ```text
//! en<TAB>us<TAB>123/house_number Fake/road Street/road ,/fsep Brooklyn/city
//! ```
//!
//! - idioma e país podem ser vazios;
//! - cada item é `texto/rótulo`, dividido na **última** barra ("1/2/house_number"
//!   é o texto "1/2");
//! - rótulos são nomes de componentes (`postcode` ou `postal_code`) ou
//!   `sep`/`fsep`, este par só em tokens separadores.
//!
//! Linhas vazias e linhas iniciadas por `#` são ignoradas.

use std::collections::{BTreeMap, HashMap};
use std::io::BufRead;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::context::{Dictionaries, ParseContext};
use crate::dictionary::{PhraseTypes, PhraseTypesTrie, Trie};
use crate::errors::{ParserError, Result};
use crate::tagger::{AddressComponent, Label, SeparatorKind};
use crate::tokenizer::{tokenize, Token};

/// Um endereço rotulado.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub language: Option<String>,
    pub country: Option<String>,
    /// Os textos dos itens unidos por espaço.
    pub text: String,
    /// Tokens de `text`, com offsets.
    pub tokens: Vec<Token>,
    /// Um rótulo por token.
    pub labels: Vec<Label>,
}

impl TrainingExample {
    /// Parseia um registro. `line` é usado apenas nas mensagens de erro.
    pub fn parse(line: usize, record: &str) -> Result<Self> {
        let mut fields = record.splitn(3, '\t');
        let (language, country, body) = match (fields.next(), fields.next(), fields.next()) {
            (Some(l), Some(c), Some(b)) => (l, c, b),
            _ => {
                return Err(ParserError::training(
                    line,
                    "esperados três campos separados por TAB",
                ))
            }
        };

        let mut text = String::new();
        let mut tokens = Vec::new();
        let mut labels = Vec::new();

        for item in body.split_whitespace() {
            let (surface, name) = item
                .rsplit_once('/')
                .ok_or_else(|| ParserError::training(line, format!("item sem rótulo: '{item}'")))?;
            if surface.is_empty() {
                return Err(ParserError::training(line, format!("token vazio em '{item}'")));
            }
            let label = Label::from_name(name)
                .ok_or_else(|| ParserError::training(line, format!("rótulo desconhecido: '{name}'")))?;

            if !text.is_empty() {
                text.push(' ');
            }
            let offset = text.len();
            text.push_str(surface);

            for mut token in tokenize(surface) {
                if label.is_separator() && !token.kind.is_separator() && !token.kind.is_ignorable() {
                    return Err(ParserError::training(
                        line,
                        format!("'{label}' atribuído a token que não é separador: '{surface}'"),
                    ));
                }
                token.start += offset;
                token.end += offset;
                token.index = tokens.len();
                tokens.push(token);
                labels.push(label);
            }
        }

        let has_words = tokens
            .iter()
            .any(|t| !t.kind.is_separator() && !t.kind.is_ignorable());
        if !has_words {
            return Err(ParserError::training(line, "registro sem palavras"));
        }

        Ok(Self {
            language: non_empty(language),
            country: non_empty(country),
            text,
            tokens,
            labels,
        })
    }

    /// Rótulo correto de cada palavra de um contexto preenchido com os tokens
    /// deste exemplo. `None` se alguma palavra não tiver componente.
    pub fn gold_labels(&self, ctx: &ParseContext) -> Option<Vec<AddressComponent>> {
        ctx.positions
            .iter()
            .map(|&p| {
                ctx.origins
                    .get(p)
                    .and_then(|&origin| self.labels.get(origin))
                    .and_then(Label::component)
            })
            .collect()
    }

    /// Preenche `ctx` com os tokens e tags deste exemplo.
    pub fn fill_context(&self, ctx: &mut ParseContext, dictionaries: &Dictionaries<'_>) {
        ctx.fill(
            &self.tokens,
            self.language.as_deref(),
            self.country.as_deref(),
            dictionaries,
        );
    }
}

fn non_empty(field: &str) -> Option<String> {
    let field = field.trim();
    (!field.is_empty()).then(|| field.to_string())
}

/// Lê todos os registros válidos. Registros malformados são registrados em
/// log e pulados; devolve os exemplos e o número de registros pulados.
pub fn read_examples<R: BufRead>(reader: R) -> Result<(Vec<TrainingExample>, usize)> {
    let mut examples = Vec::new();
    let mut skipped = 0;

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let record = line.trim_end_matches('\r');
        if record.trim().is_empty() || record.starts_with('#') {
            continue;
        }
        match TrainingExample::parse(i + 1, record) {
            Ok(example) => examples.push(example),
            Err(e) => {
                warn!(line = i + 1, error = %e, "registro de treino ignorado");
                skipped += 1;
            }
        }
    }
    Ok((examples, skipped))
}

/// Vocabulário: palavras normalizadas vistas pelo menos `min_count` vezes
/// (valor = contagem).
pub fn extract_vocabulary(examples: &[TrainingExample], min_count: u32) -> Trie {
    let empty = Trie::new();
    let dicts = Dictionaries::new(&empty);
    let mut ctx = ParseContext::new();
    let mut counts: HashMap<String, u32> = HashMap::new();

    for example in examples {
        example.fill_context(&mut ctx, &dicts);
        for word in &ctx.words {
            *counts.entry(word.clone()).or_insert(0) += 1;
        }
    }

    counts
        .into_iter()
        .filter(|(_, count)| *count >= min_count.max(1))
        .collect()
}

/// Dicionário de frases de componentes.
///
/// Cada sequência maximal de palavras com o mesmo componente, sem separador
/// no meio, conta como uma ocorrência da frase. Números de casa e códigos
/// postais ficam de fora. Frases vistas menos de `min_count` vezes são
/// descartadas.
pub fn extract_phrase_types(examples: &[TrainingExample], min_count: u32) -> PhraseTypesTrie {
    let empty = Trie::new();
    let dicts = Dictionaries::new(&empty);
    let mut ctx = ParseContext::new();
    let mut counts: BTreeMap<String, [u32; AddressComponent::COUNT]> = BTreeMap::new();

    for example in examples {
        example.fill_context(&mut ctx, &dicts);
        let Some(gold) = example.gold_labels(&ctx) else {
            continue;
        };

        let mut start = 0;
        for i in 0..gold.len() {
            let run_ends = i + 1 == gold.len()
                || gold[i + 1] != gold[i]
                || ctx.sep_after[i] != SeparatorKind::None;
            if !run_ends {
                continue;
            }
            let component = gold[i];
            if !matches!(component, AddressComponent::HouseNumber | AddressComponent::PostalCode) {
                let key = ctx.words[start..=i].join(" ");
                counts.entry(key).or_default()[component.index()] += 1;
            }
            start = i + 1;
        }
    }

    let mut phrases = PhraseTypesTrie::new();
    for (phrase, counts) in counts {
        if counts.iter().sum::<u32>() < min_count.max(1) {
            continue;
        }
        if let Some(types) = PhraseTypes::from_counts(&counts) {
            phrases.insert(phrase, types);
        }
    }
    phrases
}
