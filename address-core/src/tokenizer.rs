//! # Tokenizador de Endereços
//!
//! Divide o endereço bruto em tokens com classe léxica (palavra, número,
//! vírgula, hífen, ...). Cada token preserva seu offset no texto original para
//! que os componentes do resultado possam ser recortados do endereço sem
//! alterar grafia ou capitalização.
//!
//! ## Esquema de Tokenização
//!
//! 1. Segmentação por fronteiras de palavra Unicode (UAX #29), via
//!    `unicode-segmentation`. Espaços são descartados, quebras de linha viram
//!    tokens [`TokenKind::Newline`].
//! 2. Cada segmento recebe uma [`TokenKind`].
//! 3. Palavras unidas por hífen sem espaço ("Saint-Denis", "12345-6789") são
//!    fundidas em um único token. Um hífen isolado continua sendo separador.
//!
//! ## Exemplo de Uso
//!
//! ```rust
//! use address_core::tokenizer::{tokenize, TokenKind};
//!
//! let tokens = tokenize("123 Fake St., Brooklyn");
//! let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
//! assert_eq!(
//!     kinds,
//!     vec![
//!         TokenKind::Numeric,
//!         TokenKind::Word,
//!         TokenKind::Word,
//!         TokenKind::Period,
//!         TokenKind::Comma,
//!         TokenKind::Word,
//!     ]
//! );
//! ```

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

/// Classe léxica de um token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Palavra alfabética ("Street", "São").
    Word,
    /// Apenas dígitos (com `.`/`,`/`-` internos): "123", "12345-6789".
    Numeric,
    /// Letras e dígitos misturados: "4B", "A12".
    Alphanumeric,
    /// Escritas ideográficas/silábicas (CJK, kana, hangul).
    Ideographic,
    Comma,
    Semicolon,
    Colon,
    Period,
    Hyphen,
    /// Travessões e variantes (– — ―).
    Dash,
    Newline,
    /// `(`, `[`, `{`
    OpenPunct,
    /// `)`, `]`, `}`
    ClosePunct,
    AtSign,
    /// Qualquer outra pontuação ou símbolo ("#", "/", "&").
    Punctuation,
    /// Caracteres de controle ou de substituição.
    InvalidChar,
}

impl TokenKind {
    /// Nome estável usado nas features (`kind=...`).
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Word => "word",
            TokenKind::Numeric => "numeric",
            TokenKind::Alphanumeric => "alphanumeric",
            TokenKind::Ideographic => "ideographic",
            TokenKind::Comma => "comma",
            TokenKind::Semicolon => "semicolon",
            TokenKind::Colon => "colon",
            TokenKind::Period => "period",
            TokenKind::Hyphen => "hyphen",
            TokenKind::Dash => "dash",
            TokenKind::Newline => "newline",
            TokenKind::OpenPunct => "open_punct",
            TokenKind::ClosePunct => "close_punct",
            TokenKind::AtSign => "at_sign",
            TokenKind::Punctuation => "punct",
            TokenKind::InvalidChar => "invalid",
        }
    }

    /// Tokens que separam campos ou partes de um campo. Não são decodificados
    /// pelo tagger; recebem `sep`/`fsep`.
    pub fn is_separator(&self) -> bool {
        matches!(
            self,
            TokenKind::Comma
                | TokenKind::Newline
                | TokenKind::Hyphen
                | TokenKind::Dash
                | TokenKind::Semicolon
                | TokenKind::OpenPunct
                | TokenKind::ClosePunct
                | TokenKind::AtSign
        )
    }

    /// Tokens absorvidos pelo token vizinho em vez de formar fronteira.
    pub fn is_ignorable(&self) -> bool {
        matches!(
            self,
            TokenKind::InvalidChar | TokenKind::Period | TokenKind::Colon
        )
    }

    pub fn is_word_like(&self) -> bool {
        matches!(
            self,
            TokenKind::Word | TokenKind::Numeric | TokenKind::Alphanumeric | TokenKind::Ideographic
        )
    }
}

/// Um token extraído do endereço.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Token {
    /// O texto do token (ex: "Brooklyn", ",", "12345").
    pub text: String,
    /// Índice de byte inicial no texto original (inclusive).
    pub start: usize,
    /// Índice de byte final no texto original (exclusivo).
    pub end: usize,
    /// Índice sequencial do token na lista.
    pub index: usize,
    /// Classe léxica.
    pub kind: TokenKind,
}

impl Token {
    /// Cria um token começando em `start`; a classe é inferida do texto.
    pub fn new(text: impl Into<String>, start: usize) -> Self {
        let text = text.into();
        let kind = classify(&text);
        Self {
            start,
            end: start + text.len(),
            text,
            index: 0,
            kind,
        }
    }
}

/// Tokeniza um endereço.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();

    for (start, segment) in text.split_word_bound_indices() {
        if segment.chars().all(char::is_whitespace) {
            // Quebra de linha separa campos; o resto do espaço em branco some
            if segment.contains('\n') || segment.contains('\r') {
                tokens.push(Token {
                    text: segment.to_string(),
                    start,
                    end: start + segment.len(),
                    index: 0,
                    kind: TokenKind::Newline,
                });
            }
            continue;
        }
        tokens.push(Token {
            text: segment.to_string(),
            start,
            end: start + segment.len(),
            index: 0,
            kind: classify(segment),
        });
    }

    let mut tokens = join_hyphenated(tokens);

    // Re-indexa os tokens
    for (i, token) in tokens.iter_mut().enumerate() {
        token.index = i;
    }
    tokens
}

/// Infere a classe léxica de um segmento.
pub fn classify(segment: &str) -> TokenKind {
    let mut chars = segment.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        if let Some(kind) = punctuation_kind(c) {
            return kind;
        }
    }

    let mut has_digit = false;
    let mut has_alpha = false;
    let mut has_ideographic = false;
    let mut has_invalid = false;
    for c in segment.chars() {
        if c.is_numeric() {
            has_digit = true;
        } else if is_ideographic(c) {
            has_ideographic = true;
        } else if c.is_alphabetic() {
            has_alpha = true;
        } else if c.is_control() || c == '\u{FFFD}' {
            has_invalid = true;
        }
    }

    match (has_alpha, has_ideographic, has_digit) {
        (false, false, true) => TokenKind::Numeric,
        (_, _, true) => TokenKind::Alphanumeric,
        (false, true, false) => TokenKind::Ideographic,
        (true, _, false) => TokenKind::Word,
        (false, false, false) if has_invalid => TokenKind::InvalidChar,
        (false, false, false) => TokenKind::Punctuation,
    }
}

fn punctuation_kind(c: char) -> Option<TokenKind> {
    let kind = match c {
        ',' | '，' | '、' => TokenKind::Comma,
        ';' | '；' => TokenKind::Semicolon,
        ':' | '：' => TokenKind::Colon,
        '.' | '。' => TokenKind::Period,
        '-' | '\u{2010}' | '\u{2011}' => TokenKind::Hyphen,
        '\u{2012}'..='\u{2015}' | '\u{2212}' => TokenKind::Dash,
        '(' | '[' | '{' | '（' => TokenKind::OpenPunct,
        ')' | ']' | '}' | '）' => TokenKind::ClosePunct,
        '@' => TokenKind::AtSign,
        '\n' | '\r' => TokenKind::Newline,
        '\u{FFFD}' => TokenKind::InvalidChar,
        c if c.is_control() => TokenKind::InvalidChar,
        _ => return None,
    };
    Some(kind)
}

fn is_ideographic(c: char) -> bool {
    matches!(
        c,
        '\u{3040}'..='\u{30FF}'
            | '\u{3400}'..='\u{4DBF}'
            | '\u{4E00}'..='\u{9FFF}'
            | '\u{AC00}'..='\u{D7AF}'
            | '\u{F900}'..='\u{FAFF}'
    )
}

/// Funde `palavra-palavra` (sem espaços em volta do hífen) em um único token.
fn join_hyphenated(tokens: Vec<Token>) -> Vec<Token> {
    let mut out: Vec<Token> = Vec::with_capacity(tokens.len());
    let mut iter = tokens.into_iter().peekable();

    while let Some(token) = iter.next() {
        if token.kind == TokenKind::Hyphen {
            let joins = match (out.last(), iter.peek()) {
                (Some(prev), Some(next)) => {
                    prev.kind.is_word_like()
                        && next.kind.is_word_like()
                        && prev.end == token.start
                        && token.end == next.start
                }
                _ => false,
            };
            if joins {
                if let (Some(prev), Some(next)) = (out.last_mut(), iter.next()) {
                    prev.text.push_str(&token.text);
                    prev.text.push_str(&next.text);
                    prev.end = next.end;
                    prev.kind = classify(&prev.text);
                }
                continue;
            }
        }
        out.push(token);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_simple_us_address() {
        let tokens = tokenize("123 Fake Street Brooklyn NY 12345");
        assert_eq!(
            texts(&tokens),
            vec!["123", "Fake", "Street", "Brooklyn", "NY", "12345"]
        );
        assert_eq!(tokens[0].kind, TokenKind::Numeric);
        assert_eq!(tokens[1].kind, TokenKind::Word);
        assert_eq!(tokens[5].index, 5);
    }

    #[test]
    fn test_offsets_point_into_original_text() {
        let text = "Rua São Bento, 45";
        for token in tokenize(text) {
            assert_eq!(&text[token.start..token.end], token.text);
        }
    }

    #[test]
    fn test_punctuation_classes() {
        let tokens = tokenize("Fake St., Brooklyn; NY (USA) @ home");
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
        assert!(kinds.contains(&TokenKind::Period));
        assert!(kinds.contains(&TokenKind::Comma));
        assert!(kinds.contains(&TokenKind::Semicolon));
        assert!(kinds.contains(&TokenKind::OpenPunct));
        assert!(kinds.contains(&TokenKind::ClosePunct));
        assert!(kinds.contains(&TokenKind::AtSign));
    }

    #[test]
    fn test_hyphenated_words_are_joined() {
        let tokens = tokenize("Saint-Denis 12345-6789");
        assert_eq!(texts(&tokens), vec!["Saint-Denis", "12345-6789"]);
        assert_eq!(tokens[0].kind, TokenKind::Word);
        assert_eq!(tokens[1].kind, TokenKind::Numeric);
    }

    #[test]
    fn test_spaced_hyphen_stays_separator() {
        let tokens = tokenize("Main St - Springfield");
        assert_eq!(tokens[2].kind, TokenKind::Hyphen);
        assert!(tokens[2].kind.is_separator());
    }

    #[test]
    fn test_newline_token() {
        let tokens = tokenize("10 Downing St\nLondon");
        assert_eq!(tokens[3].kind, TokenKind::Newline);
        assert_eq!(tokens[4].text, "London");
    }

    #[test]
    fn test_alphanumeric_and_empty() {
        assert_eq!(classify("4B"), TokenKind::Alphanumeric);
        assert_eq!(classify("#"), TokenKind::Punctuation);
        assert!(tokenize("   ").is_empty());
    }
}
