//! # Dicionários de Frases
//!
//! Estruturas string → inteiro usadas pelo parser:
//!
//! - [`Trie`]: dicionário ordenado com consulta de prefixo. Guarda o
//!   vocabulário (palavra → contagem) e os índices dos dicionários de frases.
//! - [`PhraseTypes`]: quais componentes uma frase pode denotar e qual é o
//!   mais comum.
//! - [`PhraseDictionary`]: a interface que o casador de gazetteers consome.
//!   Qualquer dicionário externo (endereços, geodb) entra por ela.
//! - [`PhraseTypesTrie`]: implementação concreta usada pelo modelo para as
//!   frases de componentes aprendidas no treino.
//!
//! As chaves de frase são as formas normalizadas das palavras unidas por um
//! espaço ("fake street").

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Bound;

use serde::{Deserialize, Serialize};

use crate::errors::{ParserError, Result};
use crate::tagger::AddressComponent;

/// Máscara com os bits de todos os componentes conhecidos.
const KNOWN_COMPONENT_BITS: u16 = {
    let mut bits = 0u16;
    let mut i = 0;
    while i < AddressComponent::COUNT {
        bits |= AddressComponent::ALL[i].bit();
        i += 1;
    }
    bits
};

/// Componentes que uma frase pode denotar + o componente mais comum.
///
/// Empacota em 32 bits: bitset nos 16 bits baixos, índice do mais comum nos
/// 16 bits altos.
///
/// # Invariante
/// O bitset não é vazio, só contém bits de componentes conhecidos e o
/// componente mais comum pertence a ele. Em particular, com um único bit
/// ligado o mais comum é exatamente esse componente.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct PhraseTypes {
    components: u16,
    most_common: AddressComponent,
}

impl PhraseTypes {
    /// Constrói validando o invariante.
    pub fn new(components: u16, most_common: AddressComponent) -> Result<Self> {
        if components == 0 {
            return Err(ParserError::InvalidPhraseTypes("bitset vazio".to_string()));
        }
        if components & !KNOWN_COMPONENT_BITS != 0 {
            return Err(ParserError::InvalidPhraseTypes(format!(
                "bits desconhecidos no bitset {components:#06x}"
            )));
        }
        if components & most_common.bit() == 0 {
            return Err(ParserError::InvalidPhraseTypes(format!(
                "{most_common} não pertence ao bitset {components:#06x}"
            )));
        }
        Ok(Self {
            components,
            most_common,
        })
    }

    /// Frase de um único componente.
    pub fn single(component: AddressComponent) -> Self {
        Self {
            components: component.bit(),
            most_common: component,
        }
    }

    /// Monta a partir de contagens por componente (índice = ordem de
    /// enumeração). O mais comum é o de maior contagem; empates ficam com o
    /// primeiro na ordem de enumeração. `None` se todas as contagens são zero.
    pub fn from_counts(counts: &[u32; AddressComponent::COUNT]) -> Option<Self> {
        let mut components = 0u16;
        let mut best: Option<(AddressComponent, u32)> = None;
        for component in AddressComponent::ALL {
            let count = counts[component.index()];
            if count == 0 {
                continue;
            }
            components |= component.bit();
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((component, count));
            }
        }
        best.map(|(most_common, _)| Self {
            components,
            most_common,
        })
    }

    pub fn bits(&self) -> u16 {
        self.components
    }

    pub fn most_common(&self) -> AddressComponent {
        self.most_common
    }

    pub fn contains(&self, component: AddressComponent) -> bool {
        self.components & component.bit() != 0
    }

    /// Componentes do bitset, em ordem de enumeração.
    pub fn components(&self) -> impl Iterator<Item = AddressComponent> + '_ {
        AddressComponent::ALL
            .into_iter()
            .filter(move |c| self.contains(*c))
    }

    pub fn is_ambiguous(&self) -> bool {
        self.components.count_ones() > 1
    }

    pub fn to_u32(self) -> u32 {
        u32::from(self.components) | (self.most_common.index() as u32) << 16
    }

    pub fn from_u32(value: u32) -> Result<Self> {
        let components = (value & 0xffff) as u16;
        let most_common = AddressComponent::from_index((value >> 16) as usize).ok_or_else(|| {
            ParserError::InvalidPhraseTypes(format!("componente mais comum inválido em {value:#010x}"))
        })?;
        Self::new(components, most_common)
    }
}

impl fmt::Debug for PhraseTypes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhraseTypes")
            .field("components", &self.components().collect::<Vec<_>>())
            .field("most_common", &self.most_common)
            .finish()
    }
}

impl From<PhraseTypes> for u32 {
    fn from(types: PhraseTypes) -> Self {
        types.to_u32()
    }
}

impl TryFrom<u32> for PhraseTypes {
    type Error = ParserError;

    fn try_from(value: u32) -> Result<Self> {
        Self::from_u32(value)
    }
}

/// Dicionário ordenado string → `u32` com consulta de prefixo.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trie {
    entries: BTreeMap<String, u32>,
}

impl Trie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insere ou substitui; devolve o valor anterior.
    pub fn insert(&mut self, key: impl Into<String>, value: u32) -> Option<u32> {
        self.entries.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<u32> {
        self.entries.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Existe alguma chave que começa com `prefix`?
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.entries
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .next()
            .map_or(false, |(key, _)| key.starts_with(prefix))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl<K: Into<String>> FromIterator<(K, u32)> for Trie {
    fn from_iter<I: IntoIterator<Item = (K, u32)>>(iter: I) -> Self {
        let mut trie = Trie::new();
        for (key, value) in iter {
            trie.insert(key, value);
        }
        trie
    }
}

/// Interface de um dicionário de frases consultado pelo casador.
///
/// `lookup` devolve o id da frase; `phrase_types` traduz o id. Ausências não
/// são erro.
pub trait PhraseDictionary: Send + Sync {
    fn lookup(&self, phrase: &str) -> Option<u32>;

    fn phrase_types(&self, id: u32) -> Option<PhraseTypes>;

    /// Alguma frase do dicionário começa com `prefix`? Permite parar a
    /// extensão de um candidato assim que nenhuma frase maior é possível.
    fn has_prefix(&self, prefix: &str) -> bool;

    fn is_empty(&self) -> bool;
}

/// Dicionário concreto: frase → id → [`PhraseTypes`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhraseTypesTrie {
    trie: Trie,
    types: Vec<PhraseTypes>,
}

impl PhraseTypesTrie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insere a frase (ou substitui seus tipos) e devolve o id.
    pub fn insert(&mut self, phrase: impl Into<String>, types: PhraseTypes) -> u32 {
        let phrase = phrase.into();
        if let Some(id) = self.trie.get(&phrase) {
            self.types[id as usize] = types;
            return id;
        }
        let id = self.types.len() as u32;
        self.types.push(types);
        self.trie.insert(phrase, id);
        id
    }

    /// Tipos de uma frase, pela chave.
    pub fn get(&self, phrase: &str) -> Option<PhraseTypes> {
        self.trie
            .get(phrase)
            .and_then(|id| self.types.get(id as usize).copied())
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, PhraseTypes)> + '_ {
        self.trie
            .iter()
            .filter_map(|(phrase, id)| self.types.get(id as usize).map(|t| (phrase, *t)))
    }

    /// Verificação estrutural: cada id aponta para uma entrada, cada entrada
    /// é referenciada uma única vez e respeita o invariante de [`PhraseTypes`].
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.trie.len() != self.types.len() {
            return Err(format!(
                "{} frases para {} entradas de tipos",
                self.trie.len(),
                self.types.len()
            ));
        }
        let mut seen = vec![false; self.types.len()];
        for (phrase, id) in self.trie.iter() {
            let slot = seen
                .get_mut(id as usize)
                .ok_or_else(|| format!("id {id} fora do intervalo para '{phrase}'"))?;
            if *slot {
                return Err(format!("id {id} repetido em '{phrase}'"));
            }
            *slot = true;
        }
        for types in &self.types {
            PhraseTypes::new(types.bits(), types.most_common()).map_err(|e| e.to_string())?;
        }
        Ok(())
    }
}

impl PhraseDictionary for PhraseTypesTrie {
    fn lookup(&self, phrase: &str) -> Option<u32> {
        self.trie.get(phrase)
    }

    fn phrase_types(&self, id: u32) -> Option<PhraseTypes> {
        self.types.get(id as usize).copied()
    }

    fn has_prefix(&self, prefix: &str) -> bool {
        self.trie.has_prefix(prefix)
    }

    fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AddressComponent::*;

    #[test]
    fn test_known_bits_fit_in_sixteen() {
        assert_eq!(KNOWN_COMPONENT_BITS.count_ones() as usize, AddressComponent::COUNT);
    }

    #[test]
    fn test_phrase_types_invariant() {
        assert!(PhraseTypes::new(City.bit(), City).is_ok());
        assert!(PhraseTypes::new(City.bit(), State).is_err());
        assert!(PhraseTypes::new(0, City).is_err());
        assert!(PhraseTypes::new(1 << 15, City).is_err());

        let types = PhraseTypes::new(City.bit() | State.bit(), State).unwrap();
        assert!(types.is_ambiguous());
        assert_eq!(types.components().collect::<Vec<_>>(), vec![City, State]);
    }

    #[test]
    fn test_single_bit_forces_most_common() {
        for c in AddressComponent::ALL {
            let types = PhraseTypes::single(c);
            assert_eq!(types.bits().count_ones(), 1);
            assert_eq!(types.most_common(), c);
        }
    }

    #[test]
    fn test_u32_packing() {
        let types = PhraseTypes::new(City.bit() | CityDistrict.bit(), CityDistrict).unwrap();
        let packed = types.to_u32();
        assert_eq!(packed & 0xffff, u32::from(City.bit() | CityDistrict.bit()));
        assert_eq!(packed >> 16, CityDistrict.index() as u32);
        assert_eq!(PhraseTypes::from_u32(packed).unwrap(), types);
        assert!(PhraseTypes::from_u32(City.bit() as u32 | (State.index() as u32) << 16).is_err());
    }

    #[test]
    fn test_from_counts_prefers_enumeration_order_on_ties() {
        let mut counts = [0u32; AddressComponent::COUNT];
        counts[State.index()] = 3;
        counts[City.index()] = 3;
        counts[Suburb.index()] = 1;
        let types = PhraseTypes::from_counts(&counts).unwrap();
        assert_eq!(types.most_common(), City);
        assert!(types.contains(Suburb));
        assert!(PhraseTypes::from_counts(&[0; AddressComponent::COUNT]).is_none());
    }

    #[test]
    fn test_trie_prefix_queries() {
        let trie: Trie = [("new york", 1), ("new jersey", 2), ("newark", 3)]
            .into_iter()
            .collect();
        assert_eq!(trie.get("new york"), Some(1));
        assert!(trie.has_prefix("new "));
        assert!(trie.has_prefix("newa"));
        assert!(!trie.has_prefix("new z"));
        assert!(!trie.contains("new"));
    }

    #[test]
    fn test_phrase_types_trie() {
        let mut dict = PhraseTypesTrie::new();
        let id = dict.insert("brooklyn", PhraseTypes::single(City));
        assert_eq!(dict.lookup("brooklyn"), Some(id));
        assert_eq!(dict.phrase_types(id), Some(PhraseTypes::single(City)));

        let again = dict.insert("brooklyn", PhraseTypes::single(CityDistrict));
        assert_eq!(id, again);
        assert_eq!(dict.len(), 1);
        assert_eq!(dict.get("brooklyn").unwrap().most_common(), CityDistrict);
        assert!(dict.validate().is_ok());
    }

    #[test]
    fn test_phrase_types_serde_goes_through_validation() {
        let bad = City.bit() as u32 | (Road.index() as u32) << 16;
        let parsed: std::result::Result<PhraseTypes, _> = serde_json::from_str(&bad.to_string());
        assert!(parsed.is_err());
    }
}
