//! # Rótulos de Componentes de Endereço
//!
//! Define o conjunto **fechado** de rótulos que o tagger atribui a cada token e
//! a reconstrução dos componentes nomeados a partir da sequência rotulada.
//!
//! ## Componentes
//!
//! | Rótulo externo    | Exemplo                  |
//! |-------------------|--------------------------|
//! | `house`           | Empire State Building    |
//! | `house_number`    | 123                      |
//! | `road`            | Fake Street              |
//! | `suburb`          | Park Slope               |
//! | `city_district`   | Brooklyn (borough)       |
//! | `city`            | New York                 |
//! | `state_district`  | Kings County             |
//! | `state`           | NY                       |
//! | `postcode`        | 12345                    |
//! | `country`         | USA                      |
//!
//! Além deles existem dois pseudo-rótulos sem conteúdo semântico, usados
//! apenas em tokens separadores: `sep` (dentro de um campo, ex: hífen) e
//! `fsep` (entre campos, ex: vírgula). Eles nunca aparecem no resultado.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::tokenizer::{Token, TokenKind};

/// Componentes de endereço reconhecidos pelo parser.
///
/// A ordem das variantes é a ordem de enumeração: é ela que desempata o argmax
/// do perceptron e indexa as linhas de pesos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressComponent {
    House,
    HouseNumber,
    Road,
    Suburb,
    CityDistrict,
    City,
    StateDistrict,
    State,
    #[serde(rename = "postcode")]
    PostalCode,
    Country,
}

impl AddressComponent {
    /// Número total de componentes.
    pub const COUNT: usize = 10;

    /// Todos os componentes, em ordem de enumeração.
    pub const ALL: [AddressComponent; AddressComponent::COUNT] = [
        AddressComponent::House,
        AddressComponent::HouseNumber,
        AddressComponent::Road,
        AddressComponent::Suburb,
        AddressComponent::CityDistrict,
        AddressComponent::City,
        AddressComponent::StateDistrict,
        AddressComponent::State,
        AddressComponent::PostalCode,
        AddressComponent::Country,
    ];

    /// Nome externo do componente. A grafia é contrato com os consumidores.
    pub fn name(&self) -> &'static str {
        match self {
            AddressComponent::House => "house",
            AddressComponent::HouseNumber => "house_number",
            AddressComponent::Road => "road",
            AddressComponent::Suburb => "suburb",
            AddressComponent::CityDistrict => "city_district",
            AddressComponent::City => "city",
            AddressComponent::StateDistrict => "state_district",
            AddressComponent::State => "state",
            AddressComponent::PostalCode => "postcode",
            AddressComponent::Country => "country",
        }
    }

    /// Índice 0..10 (linha da tabela de pesos).
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Bit do componente no bitset de [`PhraseTypes`](crate::dictionary::PhraseTypes).
    pub const fn bit(&self) -> u16 {
        match self {
            AddressComponent::House => 1 << 0,
            AddressComponent::HouseNumber => 1 << 1,
            AddressComponent::Road => 1 << 4,
            AddressComponent::Suburb => 1 << 7,
            AddressComponent::CityDistrict => 1 << 8,
            AddressComponent::City => 1 << 9,
            AddressComponent::StateDistrict => 1 << 10,
            AddressComponent::State => 1 << 11,
            AddressComponent::PostalCode => 1 << 12,
            AddressComponent::Country => 1 << 13,
        }
    }

    /// Tenta parsear a partir do nome externo (ex: "road" → Some(Road)).
    /// Aceita também `postal_code` como sinônimo de `postcode`.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        if name == "postal_code" {
            return Some(AddressComponent::PostalCode);
        }
        Self::ALL.iter().copied().find(|c| c.name() == name)
    }
}

impl fmt::Display for AddressComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classificação do espaço entre duas palavras.
///
/// A ordem importa: quando vários separadores aparecem no mesmo intervalo,
/// vale o mais forte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeparatorKind {
    #[default]
    None,
    /// Separação dentro de um campo (hífen, travessão, parênteses, arroba).
    FieldInternal,
    /// Separação entre campos (vírgula, ponto e vírgula, quebra de linha).
    Field,
}

impl SeparatorKind {
    pub fn name(&self) -> &'static str {
        match self {
            SeparatorKind::None => "none",
            SeparatorKind::FieldInternal => "internal",
            SeparatorKind::Field => "field",
        }
    }

    /// Classe de separador de um token, se ele for separador.
    pub fn of_token(kind: TokenKind) -> Option<Self> {
        match kind {
            TokenKind::Comma | TokenKind::Semicolon | TokenKind::Newline => Some(SeparatorKind::Field),
            k if k.is_separator() => Some(SeparatorKind::FieldInternal),
            _ => None,
        }
    }
}

/// Rótulo atribuído a um token: um componente ou um pseudo-rótulo de separador.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Component(AddressComponent),
    /// `sep`
    Separator,
    /// `fsep`
    FieldSeparator,
}

impl Label {
    pub const SEPARATOR: &'static str = "sep";
    pub const FIELD_SEPARATOR: &'static str = "fsep";

    /// Representação textual (ex: "road", "sep", "fsep").
    pub fn name(&self) -> &'static str {
        match self {
            Label::Component(c) => c.name(),
            Label::Separator => Self::SEPARATOR,
            Label::FieldSeparator => Self::FIELD_SEPARATOR,
        }
    }

    /// Parseia um rótulo de corpus. `sep`/`fsep` não diferenciam caixa.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        match lower.as_str() {
            Self::SEPARATOR => Some(Label::Separator),
            Self::FIELD_SEPARATOR => Some(Label::FieldSeparator),
            _ => AddressComponent::from_name(&lower).map(Label::Component),
        }
    }

    pub fn is_separator(&self) -> bool {
        !matches!(self, Label::Component(_))
    }

    pub fn component(&self) -> Option<AddressComponent> {
        match self {
            Label::Component(c) => Some(*c),
            _ => None,
        }
    }
}

impl From<AddressComponent> for Label {
    fn from(component: AddressComponent) -> Self {
        Label::Component(component)
    }
}

impl From<SeparatorKind> for Label {
    fn from(kind: SeparatorKind) -> Self {
        match kind {
            SeparatorKind::Field => Label::FieldSeparator,
            SeparatorKind::FieldInternal | SeparatorKind::None => Label::Separator,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Um componente do endereço com o texto recortado do original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedComponent {
    pub component: AddressComponent,
    pub value: String,
}

impl ParsedComponent {
    pub fn name(&self) -> &'static str {
        self.component.name()
    }
}

/// Resultado do parse: componentes na ordem em que aparecem no endereço.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseResult {
    components: Vec<ParsedComponent>,
}

impl ParseResult {
    pub fn components(&self) -> &[ParsedComponent] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ParsedComponent> {
        self.components.iter()
    }

    /// Primeiro valor rotulado com `component`.
    pub fn get(&self, component: AddressComponent) -> Option<&str> {
        self.components
            .iter()
            .find(|c| c.component == component)
            .map(|c| c.value.as_str())
    }

    /// Pares `(nome, texto)`, o formato de resposta do parser.
    pub fn to_pairs(&self) -> Vec<(&'static str, &str)> {
        self.components
            .iter()
            .map(|c| (c.name(), c.value.as_str()))
            .collect()
    }
}

impl<'a> IntoIterator for &'a ParseResult {
    type Item = &'a ParsedComponent;
    type IntoIter = std::slice::Iter<'a, ParsedComponent>;

    fn into_iter(self) -> Self::IntoIter {
        self.components.iter()
    }
}

/// Converte a sequência rotulada em componentes nomeados.
///
/// Cada componente é uma sequência maximal de tokens com o mesmo rótulo:
/// - `fsep` fecha o componente corrente;
/// - `sep` é transparente: "Saint - Denis" rotulado city/sep/city continua
///   sendo uma única cidade;
/// - o texto é o trecho do endereço original entre o primeiro e o último token.
///
/// # Exemplo
/// `[house_number, road, road, fsep, city]` -> `[house_number, road, city]`
pub fn collapse_labels(address: &str, tokens: &[Token], labels: &[Label]) -> Result<ParseResult> {
    let mut components = Vec::new();
    components.try_reserve(tokens.len())?;

    // (componente, primeiro token, último token)
    let mut current: Option<(AddressComponent, usize, usize)> = None;

    for (i, label) in labels.iter().enumerate().take(tokens.len()) {
        match label {
            Label::FieldSeparator => {
                if let Some(run) = current.take() {
                    components.push(run_component(address, tokens, run));
                }
            }
            Label::Separator => {}
            Label::Component(component) => match current.as_mut() {
                Some((c, _, last)) if c == component => *last = i,
                _ => {
                    if let Some(run) = current.take() {
                        components.push(run_component(address, tokens, run));
                    }
                    current = Some((*component, i, i));
                }
            },
        }
    }
    if let Some(run) = current.take() {
        components.push(run_component(address, tokens, run));
    }

    Ok(ParseResult { components })
}

fn run_component(
    address: &str,
    tokens: &[Token],
    (component, first, last): (AddressComponent, usize, usize),
) -> ParsedComponent {
    let start = tokens[first].start;
    let end = tokens[last].end;
    let value = match address.get(start..end) {
        Some(slice) if start < end => slice.trim().to_string(),
        // Tokens fornecidos pelo chamador podem não apontar para `address`
        _ => tokens[first..=last]
            .iter()
            .filter(|t| !t.kind.is_separator())
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" "),
    };
    ParsedComponent { component, value }
}
