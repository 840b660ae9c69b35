//! # Função de Features
//!
//! Gera as features esparsas (strings) de uma palavra do [`ParseContext`],
//! dadas as duas decisões anteriores do tagger. A função é pura: mesmo
//! contexto e mesmos rótulos anteriores produzem exatamente as mesmas chaves.
//!
//! ## Famílias de Features
//!
//! | Família          | Exemplo                     | Ideia                                   |
//! |------------------|-----------------------------|-----------------------------------------|
//! | Viés             | `bias`                      | Frequência a priori de cada componente  |
//! | Palavra          | `w=street`, `w=<unk>`       | Palavras frequentes do treino           |
//! | Classe           | `kind=numeric`              | Números vs. palavras vs. ideogramas     |
//! | Afixos           | `pre3=str`, `suf2=et`       | Generaliza para palavras fora do vocab  |
//! | Vizinhos         | `w-1=fake`, `w+1=<unk>`     | Contexto local                          |
//! | Separadores      | `sep+=field`                | Fronteiras de campo (vírgulas)          |
//! | Idioma / país    | `lang=en`, `country=us`     | Convenções locais (ordem dos campos)    |
//! | Gazetteers       | `ph:geo:city`, `ph:comp:w=fake street` | Conhecimento de dicionários  |
//! | Rótulos prévios  | `p1=road`, `p1p2=road START`| Dependência sequencial (greedy)         |
//!
//! As formas normalizadas já trocam dígitos por `D`, então `w=DDDDD` cobre
//! qualquer CEP/ZIP de cinco dígitos.

use crate::context::ParseContext;
use crate::gazetteer::DictionaryKind;
use crate::tagger::AddressComponent;

/// Rótulo anterior no início da sequência.
pub const START: &str = "START";

/// Palavra fora do vocabulário.
pub const UNKNOWN: &str = "<unk>";

const AFFIX_LENGTHS: [usize; 3] = [2, 3, 4];

/// Escreve em `out` as features da palavra `i`.
///
/// `prev` e `prev2` são os rótulos das duas palavras anteriores (`None` no
/// início). O conteúdo anterior de `out` é descartado.
pub fn address_features(
    ctx: &ParseContext,
    i: usize,
    prev: Option<AddressComponent>,
    prev2: Option<AddressComponent>,
    out: &mut Vec<String>,
) {
    out.clear();

    let word = vocab_word(ctx, i);
    let kind = ctx.tokens[ctx.positions[i]].kind.name();

    out.push("bias".to_string());
    out.push(format!("w={word}"));
    out.push(format!("kind={kind}"));

    let chars: Vec<char> = ctx.words[i].chars().collect();
    for n in AFFIX_LENGTHS {
        if chars.len() >= n {
            out.push(format!("pre{n}={}", chars[..n].iter().collect::<String>()));
            out.push(format!("suf{n}={}", chars[chars.len() - n..].iter().collect::<String>()));
        }
    }

    if i == 0 {
        out.push("first".to_string());
    } else {
        out.push(format!("w-1={}", vocab_word(ctx, i - 1)));
    }
    if i + 1 == ctx.len() {
        out.push("last".to_string());
    } else {
        out.push(format!("w+1={}", vocab_word(ctx, i + 1)));
    }

    out.push(format!("sep-={}", ctx.sep_before[i].name()));
    out.push(format!("sep+={}", ctx.sep_after[i].name()));

    if let Some(language) = &ctx.language {
        out.push(format!("lang={language}"));
    }
    if let Some(country) = &ctx.country {
        out.push(format!("country={country}"));
    }

    for (kind, phrase) in DictionaryKind::ALL.into_iter().zip(ctx.membership(i)) {
        let Some(phrase) = phrase else { continue };
        let dict = kind.name();
        for component in phrase.types.components() {
            out.push(format!("ph:{dict}:{component}"));
        }
        out.push(format!("ph:{dict}:common={}", phrase.types.most_common()));
        let pos = if phrase.start == i { "begin" } else { "inside" };
        out.push(format!("ph:{dict}:pos={pos}"));
        if kind == DictionaryKind::Component && phrase.len > 1 {
            out.push(format!("ph:comp:w={}", ctx.phrase_key(phrase)));
        }
    }
    if let Some(component) = ctx.resolved[i] {
        out.push(format!("ph:resolved={component}"));
    }

    let p1 = prev.map_or(START, |c| c.name());
    let p2 = prev2.map_or(START, |c| c.name());
    out.push(format!("p1={p1}"));
    out.push(format!("p2={p2}"));
    out.push(format!("p1p2={p1} {p2}"));
    out.push(format!("p1|w={p1} {word}"));
    out.push(format!("p1|kind={p1} {kind}"));
}

fn vocab_word(ctx: &ParseContext, i: usize) -> &str {
    if ctx.known[i] {
        &ctx.words[i]
    } else {
        UNKNOWN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Dictionaries;
    use crate::dictionary::{PhraseTypes, PhraseTypesTrie, Trie};
    use crate::tokenizer::tokenize;
    use AddressComponent::*;

    fn context(address: &str, components: &PhraseTypesTrie) -> ParseContext {
        let vocab: Trie = ["fake", "street", "brooklyn"].into_iter().map(|w| (w, 1)).collect();
        let dicts = Dictionaries::new(&vocab).with_store(DictionaryKind::Component, components);
        let mut ctx = ParseContext::new();
        ctx.fill(&tokenize(address), Some("en"), Some("us"), &dicts);
        ctx
    }

    fn features(ctx: &ParseContext, i: usize, prev: Option<AddressComponent>) -> Vec<String> {
        let mut out = Vec::new();
        address_features(ctx, i, prev, None, &mut out);
        out
    }

    #[test]
    fn test_basic_features() {
        let ctx = context("123 Fake Street", &PhraseTypesTrie::new());
        let f = features(&ctx, 0, None);
        for expected in ["bias", "w=<unk>", "kind=numeric", "first", "w+1=fake", "lang=en", "country=us", "p1=START", "p2=START"] {
            assert!(f.contains(&expected.to_string()), "faltou {expected}: {f:?}");
        }
        assert!(f.contains(&"pre2=DD".to_string()));
        assert!(!f.iter().any(|k| k.starts_with("pre4")));
    }

    #[test]
    fn test_affixes_and_neighbours() {
        let ctx = context("123 Fake Street", &PhraseTypesTrie::new());
        let f = features(&ctx, 2, Some(Road));
        assert!(f.contains(&"w=street".to_string()));
        assert!(f.contains(&"pre4=stre".to_string()));
        assert!(f.contains(&"suf3=eet".to_string()));
        assert!(f.contains(&"w-1=fake".to_string()));
        assert!(f.contains(&"last".to_string()));
        assert!(f.contains(&"p1=road".to_string()));
        assert!(f.contains(&"p1|w=road street".to_string()));
    }

    #[test]
    fn test_separator_features() {
        let ctx = context("Fake Street, Brooklyn", &PhraseTypesTrie::new());
        let f = features(&ctx, 1, Some(Road));
        assert!(f.contains(&"sep+=field".to_string()));
        assert!(f.contains(&"sep-=none".to_string()));
    }

    #[test]
    fn test_phrase_features() {
        let mut components = PhraseTypesTrie::new();
        components.insert(
            "fake street",
            PhraseTypes::new(Road.bit() | Suburb.bit(), Road).unwrap(),
        );
        let ctx = context("123 Fake Street", &components);

        let begin = features(&ctx, 1, Some(HouseNumber));
        assert!(begin.contains(&"ph:comp:road".to_string()));
        assert!(begin.contains(&"ph:comp:suburb".to_string()));
        assert!(begin.contains(&"ph:comp:common=road".to_string()));
        assert!(begin.contains(&"ph:comp:pos=begin".to_string()));
        assert!(begin.contains(&"ph:comp:w=fake street".to_string()));
        assert!(begin.contains(&"ph:resolved=road".to_string()));

        let inside = features(&ctx, 2, Some(Road));
        assert!(inside.contains(&"ph:comp:pos=inside".to_string()));

        let none = features(&ctx, 0, None);
        assert!(!none.iter().any(|k| k.starts_with("ph:")));
    }

    #[test]
    fn test_features_are_deterministic_and_buffer_is_reset() {
        let ctx = context("123 Fake Street", &PhraseTypesTrie::new());
        let mut out = vec!["lixo".to_string()];
        address_features(&ctx, 1, Some(HouseNumber), None, &mut out);
        assert!(!out.contains(&"lixo".to_string()));
        assert_eq!(out, features(&ctx, 1, Some(HouseNumber)));
    }
}
