//! # Normalização de Strings e Tokens
//!
//! Toda comparação com vocabulário e dicionários é feita sobre a forma
//! normalizada do token, nunca sobre o texto cru. São dois níveis de opções:
//!
//! - [`StringOptions`]: aplicadas ao texto inteiro do token: decomposição
//!   Unicode, caixa baixa, transliteração latina para ASCII.
//! - [`TokenOptions`]: ajustes por token: remover hífens, ponto final,
//!   pontos de siglas, e trocar cada dígito por `D`.
//!
//! O parser usa sempre [`ADDRESS_PARSER_STRING_OPTIONS`] e
//! [`ADDRESS_PARSER_TOKEN_OPTIONS`] (via [`normalize_word`]), tanto no treino
//! quanto na inferência.

use bitflags::bitflags;
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::tokenizer::TokenKind;

bitflags! {
    /// Opções de normalização do texto inteiro.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StringOptions: u32 {
        /// Decomposição canônica (NFD).
        const DECOMPOSE = 1 << 0;
        /// Caixa baixa.
        const LOWERCASE = 1 << 1;
        /// Transliteração de letras latinas para ASCII (remove diacríticos).
        const LATIN_ASCII = 1 << 2;
    }
}

bitflags! {
    /// Opções de normalização por token.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TokenOptions: u32 {
        /// "saint-denis" -> "saintdenis"
        const DELETE_HYPHENS = 1 << 0;
        /// "st." -> "st"
        const DELETE_FINAL_PERIOD = 1 << 1;
        /// "u.s.a." -> "usa"
        const DELETE_ACRONYM_PERIODS = 1 << 2;
        /// "12345" -> "DDDDD"
        const REPLACE_DIGITS = 1 << 3;
    }
}

pub const ADDRESS_PARSER_STRING_OPTIONS: StringOptions = StringOptions::DECOMPOSE
    .union(StringOptions::LOWERCASE)
    .union(StringOptions::LATIN_ASCII);

pub const ADDRESS_PARSER_TOKEN_OPTIONS: TokenOptions = TokenOptions::DELETE_HYPHENS
    .union(TokenOptions::DELETE_FINAL_PERIOD)
    .union(TokenOptions::DELETE_ACRONYM_PERIODS)
    .union(TokenOptions::REPLACE_DIGITS);

/// Marcador que substitui cada dígito.
pub const DIGIT_MARKER: char = 'D';

static ACRONYM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\p{L}(?:\.\p{L})+\.?$").expect("regex de siglas válida"));

/// Normaliza um texto conforme `options`.
///
/// Com [`StringOptions::DECOMPOSE`] o texto inteiro passa por NFD antes de
/// qualquer outra etapa, então formas canonicamente equivalentes dão a mesma
/// chave em qualquer escrita. A transliteração só toca caracteres latinos
/// (inclusive as formas de largura total) e as marcas combinantes que os
/// seguem; outras escritas mantêm suas marcas.
pub fn normalize_string(text: &str, options: StringOptions) -> String {
    let decomposed: String;
    let text = if options.contains(StringOptions::DECOMPOSE) {
        decomposed = text.nfd().collect();
        decomposed.as_str()
    } else {
        text
    };

    let mut out = String::with_capacity(text.len());
    if options.contains(StringOptions::LATIN_ASCII) {
        let mut after_latin = false;
        for c in text.chars() {
            if is_combining_mark(c) {
                if !after_latin {
                    out.push(c);
                }
                continue;
            }
            after_latin = is_latin_like(c);
            if after_latin {
                push_latin_ascii(c, &mut out);
            } else {
                out.push(c);
            }
        }
    } else {
        out.push_str(text);
    }

    if options.contains(StringOptions::LOWERCASE) {
        out.to_lowercase()
    } else {
        out
    }
}

fn push_latin_ascii(c: char, out: &mut String) {
    if let Some(ascii) = latin_ascii(c) {
        out.push_str(ascii);
        return;
    }
    for d in std::iter::once(c).nfkd() {
        if is_combining_mark(d) {
            continue;
        }
        match latin_ascii(d) {
            Some(ascii) => out.push_str(ascii),
            None => out.push(d),
        }
    }
}

/// Aplica as opções por token sobre um texto já normalizado.
pub fn normalize_token(text: &str, kind: TokenKind, options: TokenOptions) -> String {
    let mut token = text.to_string();

    if options.contains(TokenOptions::DELETE_ACRONYM_PERIODS) && ACRONYM.is_match(&token) {
        token.retain(|c| c != '.');
    }
    if options.contains(TokenOptions::DELETE_FINAL_PERIOD) && token.len() > 1 && token.ends_with('.') {
        token.pop();
    }
    if options.contains(TokenOptions::DELETE_HYPHENS) && kind.is_word_like() {
        token.retain(|c| c != '-');
    }
    if options.contains(TokenOptions::REPLACE_DIGITS) {
        token = token
            .chars()
            .map(|c| if c.is_numeric() { DIGIT_MARKER } else { c })
            .collect();
    }
    token
}

/// Forma normalizada de um token do parser (as duas etapas com as opções padrão).
pub fn normalize_word(text: &str, kind: TokenKind) -> String {
    let normalized = normalize_string(text, ADDRESS_PARSER_STRING_OPTIONS);
    normalize_token(&normalized, kind, ADDRESS_PARSER_TOKEN_OPTIONS)
}

fn is_latin_like(c: char) -> bool {
    c <= '\u{024F}'
        || ('\u{1E00}'..='\u{1EFF}').contains(&c)
        || ('\u{2010}'..='\u{201F}').contains(&c)
        || ('\u{FF00}'..='\u{FFEF}').contains(&c)
}

/// Letras latinas sem decomposição canônica para ASCII.
fn latin_ascii(c: char) -> Option<&'static str> {
    let s = match c {
        'ß' => "ss",
        'ẞ' => "SS",
        'æ' => "ae",
        'Æ' => "AE",
        'œ' => "oe",
        'Œ' => "OE",
        'ø' => "o",
        'Ø' => "O",
        'ł' => "l",
        'Ł' => "L",
        'đ' | 'ð' => "d",
        'Đ' | 'Ð' => "D",
        'þ' => "th",
        'Þ' => "TH",
        'ı' => "i",
        'ħ' => "h",
        'Ħ' => "H",
        '\u{2018}' | '\u{2019}' | '\u{201B}' => "'",
        '\u{201C}' | '\u{201D}' | '\u{201F}' => "\"",
        _ => return None,
    };
    Some(s)
}
