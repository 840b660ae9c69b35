//! # Treino do Parser
//!
//! Orquestra o treino do perceptron médio sobre um corpus de endereços
//! rotulados:
//!
//! 1. **Pré-passada**: vocabulário e dicionário de frases de componentes
//!    extraídos do próprio corpus ([`crate::corpus`]).
//! 2. **Passadas**: cada exemplo é convertido em [`ParseContext`] (com os
//!    mesmos dicionários usados na inferência) e decodificado com teacher
//!    forcing; erros atualizam os pesos.
//! 3. **Publicação**: os pesos médios viram um [`AddressParser`] imutável.
//!
//! A ordem dos exemplos é embaralhada a cada passada com um `StdRng`
//! semeado, então o mesmo corpus e a mesma configuração produzem sempre o
//! mesmo modelo.

use std::io::BufRead;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::TrainerConfig;
use crate::context::{Dictionaries, ParseContext};
use crate::corpus::{extract_phrase_types, extract_vocabulary, read_examples, TrainingExample};
use crate::dictionary::{PhraseTypesTrie, Trie};
use crate::errors::{ParserError, Result};
use crate::gazetteer::{DictionaryKind, Gazetteers};
use crate::model::AddressParserModel;
use crate::parser::AddressParser;
use crate::perceptron::{train_sequence, PerceptronTrainer};

/// Estatísticas de uma passada.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassStats {
    /// Número da passada (a partir de 1).
    pub pass: usize,
    /// Palavras decodificadas.
    pub tokens: usize,
    /// Palavras em que a predição (antes da atualização) errou.
    pub errors: usize,
}

impl PassStats {
    pub fn accuracy(&self) -> f64 {
        if self.tokens == 0 {
            return 0.0;
        }
        1.0 - self.errors as f64 / self.tokens as f64
    }
}

/// Resumo de um treino completo.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub examples: usize,
    /// Registros descartados na leitura do corpus.
    pub skipped: usize,
    pub passes: Vec<PassStats>,
}

/// Ponto de entrada do treino.
#[derive(Debug, Clone, Default)]
pub struct AddressParserTrainer {
    config: TrainerConfig,
    gazetteers: Gazetteers,
}

impl AddressParserTrainer {
    pub fn new(config: TrainerConfig) -> Self {
        Self {
            config,
            gazetteers: Gazetteers::new(),
        }
    }

    /// Dicionários externos consultados no treino e embutidos no parser final.
    pub fn with_gazetteers(mut self, gazetteers: Gazetteers) -> Self {
        self.gazetteers = gazetteers;
        self
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    /// Prepara uma sessão: extrai vocabulário e frases, sem treinar ainda.
    pub fn session<'a>(&self, examples: &'a [TrainingExample]) -> Result<TrainingSession<'a>> {
        if examples.is_empty() {
            return Err(ParserError::EmptyCorpus);
        }

        let vocab = extract_vocabulary(examples, self.config.min_vocab_count);
        let phrase_types = extract_phrase_types(examples, self.config.min_phrase_count);
        info!(
            examples = examples.len(),
            vocab = vocab.len(),
            phrases = phrase_types.len(),
            "pré-passada concluída"
        );

        Ok(TrainingSession {
            config: self.config.clone(),
            gazetteers: self.gazetteers.clone(),
            examples,
            order: (0..examples.len()).collect(),
            rng: StdRng::seed_from_u64(self.config.seed),
            trainer: PerceptronTrainer::new(),
            vocab,
            phrase_types,
            context: ParseContext::new(),
            passes: 0,
        })
    }

    /// Treina `config.iterations` passadas e publica o parser.
    pub fn train(&self, examples: &[TrainingExample]) -> Result<(AddressParser, TrainingReport)> {
        let mut session = self.session(examples)?;
        let mut report = TrainingReport {
            examples: examples.len(),
            ..TrainingReport::default()
        };
        for _ in 0..self.config.iterations {
            report.passes.push(session.run_pass());
        }
        Ok((session.finish(), report))
    }

    /// Lê o corpus (registros inválidos são pulados) e treina.
    pub fn train_from_reader<R: BufRead>(&self, reader: R) -> Result<(AddressParser, TrainingReport)> {
        let (examples, skipped) = read_examples(reader)?;
        let (parser, mut report) = self.train(&examples)?;
        report.skipped = skipped;
        Ok((parser, report))
    }
}

/// Treino em andamento. Dono exclusivo dos pesos mutáveis.
pub struct TrainingSession<'a> {
    config: TrainerConfig,
    gazetteers: Gazetteers,
    examples: &'a [TrainingExample],
    order: Vec<usize>,
    rng: StdRng,
    trainer: PerceptronTrainer,
    vocab: Trie,
    phrase_types: PhraseTypesTrie,
    context: ParseContext,
    passes: usize,
}

impl TrainingSession<'_> {
    pub fn vocab(&self) -> &Trie {
        &self.vocab
    }

    pub fn phrase_types(&self) -> &PhraseTypesTrie {
        &self.phrase_types
    }

    /// Passadas já concluídas.
    pub fn passes(&self) -> usize {
        self.passes
    }

    /// Uma passada completa sobre o corpus.
    pub fn run_pass(&mut self) -> PassStats {
        let started = Instant::now();
        if self.config.shuffle {
            self.order.shuffle(&mut self.rng);
        }

        let dictionaries = Dictionaries::new(&self.vocab)
            .with_gazetteers(&self.gazetteers)
            .with_store(DictionaryKind::Component, &self.phrase_types);

        let mut stats = PassStats {
            pass: self.passes + 1,
            tokens: 0,
            errors: 0,
        };
        for &index in &self.order {
            let example = &self.examples[index];
            example.fill_context(&mut self.context, &dictionaries);
            let Some(gold) = example.gold_labels(&self.context) else {
                debug!(text = %example.text, "exemplo sem rótulos de componente ignorado");
                continue;
            };
            let (tokens, errors) = train_sequence(&mut self.trainer, &mut self.context, &gold);
            stats.tokens += tokens;
            stats.errors += errors;
        }

        self.passes += 1;
        info!(
            pass = stats.pass,
            tokens = stats.tokens,
            errors = stats.errors,
            accuracy = stats.accuracy(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "passada de treino concluída"
        );
        stats
    }

    /// Parser com os pesos médios até agora; o treino pode continuar.
    pub fn snapshot(&self) -> AddressParser {
        let model = AddressParserModel::new(
            self.trainer.snapshot(),
            self.vocab.clone(),
            self.phrase_types.clone(),
        );
        AddressParser::with_gazetteers(model, self.gazetteers.clone())
    }

    /// Encerra o treino e publica o parser final.
    pub fn finish(self) -> AddressParser {
        let model = AddressParserModel::new(self.trainer.finish(), self.vocab, self.phrase_types);
        info!(features = model.perceptron().len(), passes = self.passes, "treino finalizado");
        AddressParser::with_gazetteers(model, self.gazetteers)
    }
}
