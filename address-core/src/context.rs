//! # Contexto de Parse
//!
//! Tudo que as features precisam saber sobre um endereço, calculado uma única
//! vez antes da decodificação:
//!
//! - tokens limpos (pontos e dois-pontos absorvidos pela palavra anterior);
//! - formas normalizadas e pertinência ao vocabulário;
//! - separador antes e depois de cada palavra;
//! - frases casadas em cada dicionário e o componente resolvido por palavra.
//!
//! Um [`ParseContext`] pertence a uma única chamada de parse ou treino e pode
//! ser reaproveitado com [`ParseContext::clear`] (o que [`ParseContext::fill`]
//! já faz), evitando realocações em lotes grandes.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::dictionary::{PhraseDictionary, Trie};
use crate::errors::Result;
use crate::gazetteer::{match_phrases, DictionaryKind, Gazetteers, Phrase, PhraseMatches};
use crate::normalize::normalize_word;
use crate::tagger::{AddressComponent, Label, SeparatorKind};
use crate::tokenizer::Token;

static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z]{2,3}$").expect("regex de tags válida"));

/// Vocabulário e dicionários de frases consultados ao preencher o contexto.
#[derive(Clone, Copy)]
pub struct Dictionaries<'a> {
    pub vocab: &'a Trie,
    pub stores: [Option<&'a dyn PhraseDictionary>; DictionaryKind::COUNT],
}

impl<'a> Dictionaries<'a> {
    pub fn new(vocab: &'a Trie) -> Self {
        Self {
            vocab,
            stores: [None; DictionaryKind::COUNT],
        }
    }

    pub fn with_store(mut self, kind: DictionaryKind, store: &'a dyn PhraseDictionary) -> Self {
        self.stores[kind.index()] = Some(store);
        self
    }

    pub fn with_gazetteers(mut self, gazetteers: &'a Gazetteers) -> Self {
        for kind in [DictionaryKind::AddressDictionary, DictionaryKind::Geodb] {
            if let Some(store) = gazetteers.get(kind) {
                self.stores[kind.index()] = Some(store);
            }
        }
        self
    }
}

/// Estado por chamada do parser.
///
/// Os vetores indexados por palavra (`words`, `known`, `sep_before`,
/// `sep_after`, `resolved`) têm todos o mesmo tamanho, [`ParseContext::len`].
#[derive(Debug, Clone, Default)]
pub struct ParseContext {
    /// Tag de idioma válida (minúscula), ou `None`.
    pub language: Option<String>,
    /// Tag de país válida (minúscula), ou `None`.
    pub country: Option<String>,
    /// Tokens limpos: palavras e separadores, na ordem do endereço.
    pub tokens: Vec<Token>,
    /// Para cada token limpo, o índice do token de entrada que o originou.
    pub origins: Vec<usize>,
    /// Para cada palavra, o índice do seu token em `tokens`.
    pub positions: Vec<usize>,
    /// Forma normalizada de cada palavra.
    pub words: Vec<String>,
    /// A palavra está no vocabulário do modelo?
    pub known: Vec<bool>,
    pub sep_before: Vec<SeparatorKind>,
    pub sep_after: Vec<SeparatorKind>,
    /// Frases casadas, uma entrada por [`DictionaryKind`].
    pub phrases: [PhraseMatches; DictionaryKind::COUNT],
    /// Componente mais comum do dicionário de maior prioridade que cobre a palavra.
    pub resolved: Vec<Option<AddressComponent>>,
    /// Buffer de features reaproveitado entre posições.
    pub features: Vec<String>,
}

impl ParseContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Número de palavras decodificáveis.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn clear(&mut self) {
        self.language = None;
        self.country = None;
        self.tokens.clear();
        self.origins.clear();
        self.positions.clear();
        self.words.clear();
        self.known.clear();
        self.sep_before.clear();
        self.sep_after.clear();
        for matches in &mut self.phrases {
            matches.clear();
        }
        self.resolved.clear();
        self.features.clear();
    }

    /// Preenche o contexto para uma sequência de tokens.
    pub fn fill(
        &mut self,
        tokens: &[Token],
        language: Option<&str>,
        country: Option<&str>,
        dictionaries: &Dictionaries<'_>,
    ) {
        self.clear();
        self.language = language.and_then(|tag| clean_tag("language", tag));
        self.country = country.and_then(|tag| clean_tag("country", tag));

        self.clean_tokens(tokens);

        let mut pending = SeparatorKind::None;
        for (i, token) in self.tokens.iter().enumerate() {
            if let Some(kind) = SeparatorKind::of_token(token.kind) {
                pending = pending.max(kind);
                continue;
            }
            if let Some(last) = self.sep_after.last_mut() {
                *last = pending;
            }
            self.sep_before.push(pending);
            self.sep_after.push(SeparatorKind::None);
            pending = SeparatorKind::None;

            let word = normalize_word(&token.text, token.kind);
            self.known.push(dictionaries.vocab.contains(&word));
            self.words.push(word);
            self.positions.push(i);
        }
        if let Some(last) = self.sep_after.last_mut() {
            *last = pending;
        }

        for kind in DictionaryKind::ALL {
            match_phrases(
                &self.words,
                &self.sep_after,
                dictionaries.stores[kind.index()],
                &mut self.phrases[kind.index()],
            );
        }

        for i in 0..self.words.len() {
            let resolved = self
                .phrases
                .iter()
                .find_map(|matches| matches.phrase_at(i))
                .map(|phrase| phrase.types.most_common());
            self.resolved.push(resolved);
        }
    }

    /// Pertinência da palavra `i` em cada dicionário, na ordem de prioridade.
    pub fn membership(&self, i: usize) -> [Option<&Phrase>; DictionaryKind::COUNT] {
        std::array::from_fn(|d| self.phrases[d].phrase_at(i))
    }

    /// Chave normalizada de uma frase ("fake street").
    pub fn phrase_key(&self, phrase: &Phrase) -> String {
        self.words[phrase.start..phrase.end()].join(" ")
    }

    /// Rótulos de todos os tokens limpos a partir dos rótulos das palavras:
    /// separadores recebem `sep`/`fsep`.
    pub fn token_labels(&self, word_labels: &[AddressComponent]) -> Result<Vec<Label>> {
        let mut labels = Vec::new();
        labels.try_reserve(self.tokens.len())?;

        let mut words = word_labels.iter();
        for token in &self.tokens {
            let label = match SeparatorKind::of_token(token.kind) {
                Some(kind) => Label::from(kind),
                None => match words.next() {
                    Some(component) => Label::Component(*component),
                    None => break,
                },
            };
            labels.push(label);
        }
        Ok(labels)
    }

    /// Descarta ou funde tokens ignoráveis e separa palavras de separadores.
    fn clean_tokens(&mut self, tokens: &[Token]) {
        for (origin, token) in tokens.iter().enumerate() {
            if token.kind.is_ignorable() {
                // "St." -> "St." como um único token; ignoráveis soltos somem
                if let Some(prev) = self.tokens.last_mut() {
                    if !prev.kind.is_separator() && prev.end == token.start {
                        prev.text.push_str(&token.text);
                        prev.end = token.end;
                    }
                }
                continue;
            }
            let mut token = token.clone();
            token.index = self.tokens.len();
            self.tokens.push(token);
            self.origins.push(origin);
        }
    }
}

/// Tag de idioma/país limpa, ou `None` se não tiver 2 ou 3 letras ASCII.
fn clean_tag(field: &str, tag: &str) -> Option<String> {
    let tag = tag.trim().to_ascii_lowercase();
    if tag.is_empty() {
        return None;
    }
    if TAG.is_match(&tag) {
        Some(tag)
    } else {
        debug!(field, tag = %tag, "tag inválida, usando features independentes de idioma");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::{PhraseTypes, PhraseTypesTrie};
    use crate::tokenizer::tokenize;
    use AddressComponent::*;

    fn vocab() -> Trie {
        ["fake", "street", "brooklyn", "st"]
            .into_iter()
            .map(|w| (w, 1))
            .collect()
    }

    #[test]
    fn test_fill_normalizes_and_flags_vocabulary() {
        let vocab = vocab();
        let mut ctx = ParseContext::new();
        let tokens = tokenize("123 Fake Street Brooklyn NY 12345");
        ctx.fill(&tokens, Some("EN"), Some(" us "), &Dictionaries::new(&vocab));

        assert_eq!(ctx.len(), 6);
        assert_eq!(ctx.words, vec!["DDD", "fake", "street", "brooklyn", "ny", "DDDDD"]);
        assert_eq!(ctx.known, vec![false, true, true, true, false, false]);
        assert_eq!(ctx.language.as_deref(), Some("en"));
        assert_eq!(ctx.country.as_deref(), Some("us"));
    }

    #[test]
    fn test_invalid_tags_are_dropped() {
        let vocab = vocab();
        let mut ctx = ParseContext::new();
        let tokens = tokenize("Brooklyn");
        ctx.fill(&tokens, Some("english"), Some("u5"), &Dictionaries::new(&vocab));
        assert_eq!(ctx.language, None);
        assert_eq!(ctx.country, None);
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_period_merges_into_previous_word() {
        let vocab = vocab();
        let mut ctx = ParseContext::new();
        let address = "12 Fake St., Brooklyn";
        let tokens = tokenize(address);
        ctx.fill(&tokens, None, None, &Dictionaries::new(&vocab));

        assert_eq!(ctx.words, vec!["DD", "fake", "st", "brooklyn"]);
        let st = &ctx.tokens[ctx.positions[2]];
        assert_eq!(&address[st.start..st.end], "St.");
        // a vírgula continua como token separador
        assert_eq!(ctx.tokens.len(), 5);
        assert_eq!(ctx.origins, vec![0, 1, 2, 4, 5]);
    }

    #[test]
    fn test_separator_classes_around_words() {
        let vocab = vocab();
        let mut ctx = ParseContext::new();
        let tokens = tokenize("Fake St - Annex, Brooklyn");
        ctx.fill(&tokens, None, None, &Dictionaries::new(&vocab));

        assert_eq!(ctx.len(), 4);
        assert_eq!(ctx.sep_before[0], SeparatorKind::None);
        assert_eq!(ctx.sep_after[1], SeparatorKind::FieldInternal);
        assert_eq!(ctx.sep_before[2], SeparatorKind::FieldInternal);
        assert_eq!(ctx.sep_after[2], SeparatorKind::Field);
        assert_eq!(ctx.sep_before[3], SeparatorKind::Field);
        assert_eq!(ctx.sep_after[3], SeparatorKind::None);
    }

    #[test]
    fn test_resolution_prefers_higher_priority_dictionary() {
        let vocab = vocab();
        let mut geodb = PhraseTypesTrie::new();
        geodb.insert("brooklyn", PhraseTypes::single(City));
        let mut components = PhraseTypesTrie::new();
        components.insert("brooklyn", PhraseTypes::single(CityDistrict));
        components.insert("fake street", PhraseTypes::single(Road));

        let dicts = Dictionaries::new(&vocab)
            .with_store(DictionaryKind::Geodb, &geodb)
            .with_store(DictionaryKind::Component, &components);
        let mut ctx = ParseContext::new();
        ctx.fill(&tokenize("Fake Street Brooklyn"), None, None, &dicts);

        assert_eq!(ctx.resolved, vec![Some(Road), Some(Road), Some(City)]);
        let membership = ctx.membership(2);
        assert!(membership[DictionaryKind::AddressDictionary.index()].is_none());
        assert!(membership[DictionaryKind::Geodb.index()].is_some());
        assert!(membership[DictionaryKind::Component.index()].is_some());

        let road = ctx.membership(0)[DictionaryKind::Component.index()].copied().unwrap();
        assert_eq!(ctx.phrase_key(&road), "fake street");
    }

    #[test]
    fn test_token_labels_mark_separators() {
        let vocab = vocab();
        let mut ctx = ParseContext::new();
        ctx.fill(&tokenize("Fake St - Annex, Brooklyn"), None, None, &Dictionaries::new(&vocab));
        let labels = ctx.token_labels(&[Road, Road, Road, City]).unwrap();
        let names: Vec<&str> = labels.iter().map(Label::name).collect();
        assert_eq!(names, vec!["road", "road", "sep", "road", "fsep", "city"]);
    }

    #[test]
    fn test_context_is_reusable() {
        let vocab = vocab();
        let mut ctx = ParseContext::new();
        ctx.fill(&tokenize("Fake Street, Brooklyn"), Some("en"), None, &Dictionaries::new(&vocab));
        ctx.fill(&tokenize("Brooklyn"), None, None, &Dictionaries::new(&vocab));
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.tokens.len(), 1);
        assert_eq!(ctx.language, None);
        assert_eq!(ctx.sep_after, vec![SeparatorKind::None]);
    }
}
