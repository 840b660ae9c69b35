//! # Casamento de Gazetteers
//!
//! Localiza, na sequência de palavras normalizadas, as frases conhecidas de
//! cada dicionário (endereços, geodb, componentes aprendidos no treino).
//!
//! ## Algoritmo
//!
//! Casamento guloso da esquerda para a direita, **maior frase primeiro**:
//!
//! 1. A partir da posição `i`, estende o candidato palavra a palavra enquanto
//!    o dicionário ainda tiver alguma frase com aquele prefixo.
//! 2. A maior extensão encontrada no dicionário vence; a varredura continua
//!    logo depois dela.
//! 3. Sem casamento, a palavra fica sem pertinência e a varredura avança uma
//!    posição.
//!
//! Uma frase nunca atravessa um separador (vírgula, hífen isolado, ...).
//! Dicionário ausente ou vazio resulta em nenhuma pertinência, nunca em erro.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dictionary::{PhraseDictionary, PhraseTypes};
use crate::tagger::SeparatorKind;

/// Dicionários consultados, em ordem de prioridade para a resolução do
/// componente de uma palavra.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DictionaryKind {
    /// Dicionário de expressões de endereço ("street", "avenida", ...).
    AddressDictionary,
    /// Nomes geográficos (cidades, estados, países).
    Geodb,
    /// Frases de componentes vistas no treino (parte do modelo).
    Component,
}

impl DictionaryKind {
    pub const COUNT: usize = 3;

    pub const ALL: [DictionaryKind; DictionaryKind::COUNT] = [
        DictionaryKind::AddressDictionary,
        DictionaryKind::Geodb,
        DictionaryKind::Component,
    ];

    pub fn index(&self) -> usize {
        *self as usize
    }

    /// Prefixo curto usado nas features (`ph:geo:city`).
    pub fn name(&self) -> &'static str {
        match self {
            DictionaryKind::AddressDictionary => "dict",
            DictionaryKind::Geodb => "geo",
            DictionaryKind::Component => "comp",
        }
    }
}

/// Uma frase casada: `len` palavras a partir de `start`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Phrase {
    pub start: usize,
    pub len: usize,
    /// Id da frase no dicionário de origem.
    pub id: u32,
    pub types: PhraseTypes,
}

impl Phrase {
    /// Posição logo após a última palavra.
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    pub fn contains(&self, position: usize) -> bool {
        position >= self.start && position < self.end()
    }
}

/// Frases de um dicionário sobre uma sequência de palavras, com a pertinência
/// de cada palavra (`None` = nenhuma frase cobre a palavra).
#[derive(Debug, Clone, Default)]
pub struct PhraseMatches {
    phrases: Vec<Phrase>,
    memberships: Vec<Option<usize>>,
}

impl PhraseMatches {
    pub fn new() -> Self {
        Self::default()
    }

    /// Esvazia mantendo a capacidade alocada.
    pub fn clear(&mut self) {
        self.phrases.clear();
        self.memberships.clear();
    }

    pub fn phrases(&self) -> &[Phrase] {
        &self.phrases
    }

    /// Índice da frase que cobre a palavra `position`.
    pub fn membership(&self, position: usize) -> Option<usize> {
        self.memberships.get(position).copied().flatten()
    }

    /// A frase que cobre a palavra `position`, se houver.
    pub fn phrase_at(&self, position: usize) -> Option<&Phrase> {
        self.membership(position).and_then(|p| self.phrases.get(p))
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    fn push(&mut self, phrase: Phrase) {
        let index = self.phrases.len();
        for slot in &mut self.memberships[phrase.start..phrase.end()] {
            *slot = Some(index);
        }
        self.phrases.push(phrase);
    }
}

/// Casa as frases de `dictionary` sobre `words` (formas normalizadas).
///
/// `separators_after[i]` é o separador entre a palavra `i` e a seguinte;
/// qualquer separador diferente de [`SeparatorKind::None`] interrompe a
/// extensão de um candidato.
pub fn match_phrases(
    words: &[String],
    separators_after: &[SeparatorKind],
    dictionary: Option<&dyn PhraseDictionary>,
    out: &mut PhraseMatches,
) {
    out.clear();
    out.memberships.resize(words.len(), None);

    let dictionary = match dictionary {
        Some(d) if !d.is_empty() => d,
        _ => return,
    };

    let mut i = 0;
    let mut key = String::new();
    while i < words.len() {
        if words[i].is_empty() {
            i += 1;
            continue;
        }

        key.clear();
        key.push_str(&words[i]);
        // (tamanho, id) do maior casamento a partir de i
        let mut best: Option<(usize, u32)> = None;
        let mut j = i;
        loop {
            if let Some(id) = dictionary.lookup(&key) {
                best = Some((j - i + 1, id));
            }
            let gap = separators_after.get(j).copied().unwrap_or_default();
            if j + 1 >= words.len() || gap != SeparatorKind::None || words[j + 1].is_empty() {
                break;
            }
            key.push(' ');
            if !dictionary.has_prefix(&key) {
                break;
            }
            key.push_str(&words[j + 1]);
            j += 1;
        }

        let matched = best.and_then(|(len, id)| {
            dictionary.phrase_types(id).map(|types| Phrase {
                start: i,
                len,
                id,
                types,
            })
        });
        match matched {
            Some(phrase) => {
                out.push(phrase);
                i = phrase.end();
            }
            None => i += 1,
        }
    }
}

/// Dicionários externos opcionais. O dicionário de componentes vem do modelo.
#[derive(Clone, Default)]
pub struct Gazetteers {
    pub address_dictionary: Option<Arc<dyn PhraseDictionary>>,
    pub geodb: Option<Arc<dyn PhraseDictionary>>,
}

impl Gazetteers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_address_dictionary(mut self, dictionary: Arc<dyn PhraseDictionary>) -> Self {
        self.address_dictionary = Some(dictionary);
        self
    }

    pub fn with_geodb(mut self, geodb: Arc<dyn PhraseDictionary>) -> Self {
        self.geodb = Some(geodb);
        self
    }

    /// Dicionário externo de um tipo. `Component` nunca é externo.
    pub fn get(&self, kind: DictionaryKind) -> Option<&dyn PhraseDictionary> {
        match kind {
            DictionaryKind::AddressDictionary => self.address_dictionary.as_deref(),
            DictionaryKind::Geodb => self.geodb.as_deref(),
            DictionaryKind::Component => None,
        }
    }
}

impl fmt::Debug for Gazetteers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gazetteers")
            .field("address_dictionary", &self.address_dictionary.is_some())
            .field("geodb", &self.geodb.is_some())
            .finish()
    }
}
