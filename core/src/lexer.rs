//! Lexical pass: C source text to a flat, untyped token stream.
//!
//! Comments and preprocessor directives are dropped. Compound operators and
//! the single-character punctuation set become standalone tokens; every other
//! run of non-blank characters (`&x`, `a.b`, `arr[i]`) stays glued together.
//! String and character literals are kept whole.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{Diagnostic, Stage};

/// Compound operators isolated before single characters (longest match first).
pub const COMPOUND_OPERATORS: [&str; 10] =
    ["!=", "==", "<=", ">=", "++", "--", "+=", "-=", "||", "&&"];

/// Single characters that always form a token of their own.
pub const PUNCTUATION: [char; 14] = [
    '(', ')', '{', '}', ';', ',', '=', '+', '-', '*', '/', '<', '>', '!',
];

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?P<line>//[^\n]*)",
        r"|(?P<block>/\*(?s:.*?)(?:\*/|\z))",
        r#"|(?P<string>"(?:[^"\\\n]|\\.)*"?|'(?:[^'\\\n]|\\.)*'?)"#,
        r"|(?P<op>!=|==|<=|>=|\+\+|--|\+=|-=|\|\||&&|[(){};,=+\-*/<>!])",
        r#"|(?P<word>[^\s(){};,=+\-*/<>!"']+)"#,
    ))
    .expect("valid token regex")
});

/// Split `source` into tokens, dropping anything worth reporting.
pub fn tokenize(source: &str) -> Vec<String> {
    tokenize_reporting(source, &mut Vec::new())
}

/// Split `source` into tokens.
///
/// Lexical anomalies never fail: an unterminated block comment swallows the
/// rest of the input (and is reported at the index of the next token) and an
/// unterminated literal ends at the line break.
pub fn tokenize_reporting(source: &str, diagnostics: &mut Vec<Diagnostic>) -> Vec<String> {
    let text = strip_directives(source);
    let mut tokens = Vec::new();
    for caps in TOKEN_RE.captures_iter(&text) {
        if caps.name("line").is_some() {
            continue;
        }
        if let Some(block) = caps.name("block") {
            if !block.as_str().ends_with("*/") || block.as_str().len() < 4 {
                tracing::warn!(
                    offset = block.start(),
                    "unterminated block comment runs to end of input"
                );
                diagnostics.push(Diagnostic::new(
                    Stage::Lex,
                    "unterminated block comment runs to end of input",
                    Some(tokens.len()),
                ));
            }
            continue;
        }
        if let Some(token) = caps
            .name("string")
            .or_else(|| caps.name("op"))
            .or_else(|| caps.name("word"))
        {
            tokens.push(token.as_str().to_string());
        }
    }
    tokens
}

/// Blank out preprocessor lines, following `\` continuations.
///
/// Line breaks are preserved so the remaining text keeps its shape.
fn strip_directives(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut continuing = false;
    for line in source.lines() {
        if continuing || line.trim_start().starts_with('#') {
            continuing = line.trim_end().ends_with('\\');
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    out
}

/// Whether `token` is one of the separator tokens produced by the lexer.
pub fn is_operator(token: &str) -> bool {
    COMPOUND_OPERATORS.contains(&token)
        || (token.chars().count() == 1 && token.chars().all(|c| PUNCTUATION.contains(&c)))
}
