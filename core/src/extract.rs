//! Function extraction over the token stream.
//!
//! Recognises `<type> <name> ( ... ) { ... }` definitions, skips prototypes,
//! and falls back to one implicit `main` holding every token when nothing
//! looks like a definition.

use crate::{lexer, Diagnostic, Stage};

/// Return-type keywords that may open a function definition.
pub const RETURN_TYPES: [&str; 6] = ["int", "void", "float", "double", "char", "long"];

/// Raw token slices of one function definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFunction {
    pub name: String,
    pub args: Vec<String>,
    pub body: Vec<String>,
}

/// Index of the token closing the bracket opened at `start`.
///
/// Returns `None` when `tokens[start]` is not `open` or the bracket never
/// closes. Nested pairs of the same kind are counted.
pub fn matching_close(tokens: &[String], start: usize, open: &str, close: &str) -> Option<usize> {
    if tokens.get(start).map(String::as_str) != Some(open) {
        return None;
    }
    let mut balance = 0usize;
    for (offset, token) in tokens[start..].iter().enumerate() {
        if token == open {
            balance += 1;
        } else if token == close {
            balance -= 1;
            if balance == 0 {
                return Some(start + offset);
            }
        }
    }
    None
}

/// Tokens strictly between the `{` at `start` and its matching `}`, plus
/// the index of that `}`.
pub fn block_tokens(tokens: &[String], start: usize) -> Option<(&[String], usize)> {
    let end = matching_close(tokens, start, "{", "}")?;
    Some((&tokens[start + 1..end], end))
}

enum Signature {
    Definition { args: Vec<String>, body: Vec<String>, end: usize },
    Prototype { resume: usize },
    NotAFunction,
    Malformed(&'static str),
}

/// Find every function definition in `tokens`.
pub fn extract_functions(
    tokens: &[String],
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<ExtractedFunction> {
    let mut functions = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        if !RETURN_TYPES.contains(&tokens[i].as_str()) {
            i += 1;
            continue;
        }
        match read_signature(tokens, i) {
            Signature::Definition { args, body, end } => {
                functions.push(ExtractedFunction {
                    name: tokens[i + 1].clone(),
                    args,
                    body,
                });
                i = end + 1;
            }
            Signature::Prototype { resume } => i = resume,
            Signature::NotAFunction => i += 1,
            Signature::Malformed(what) => {
                let name = tokens.get(i + 1).cloned().unwrap_or_default();
                tracing::warn!(function = %name, position = i, "skipping function: {what}");
                diagnostics.push(Diagnostic::new(
                    Stage::Extract,
                    format!("skipped function `{name}`: {what}"),
                    Some(i),
                ));
                i += 1;
            }
        }
    }

    if functions.is_empty() && !tokens.is_empty() {
        functions.push(ExtractedFunction {
            name: "main".into(),
            args: Vec::new(),
            body: tokens.to_vec(),
        });
    }
    functions
}

fn read_signature(tokens: &[String], type_index: usize) -> Signature {
    let name_index = type_index + 1;
    let open = name_index + 1;
    match (tokens.get(name_index), tokens.get(open)) {
        (Some(name), Some(paren)) if paren == "(" && !lexer::is_operator(name) => {}
        _ => return Signature::NotAFunction,
    }

    // A `;` inside the parameter list means this is not a definition.
    let mut balance = 0usize;
    let mut close = None;
    for (k, token) in tokens.iter().enumerate().skip(open) {
        match token.as_str() {
            "(" => balance += 1,
            ")" => {
                balance -= 1;
                if balance == 0 {
                    close = Some(k);
                    break;
                }
            }
            ";" => return Signature::Prototype { resume: k + 1 },
            _ => {}
        }
    }
    let Some(close) = close else {
        return Signature::Malformed("unmatched `(` in parameter list");
    };
    let args = tokens[open + 1..close].to_vec();

    for (j, token) in tokens.iter().enumerate().skip(close + 1) {
        match token.as_str() {
            "{" => {
                return match block_tokens(tokens, j) {
                    Some((body, end)) => Signature::Definition {
                        args,
                        body: body.to_vec(),
                        end,
                    },
                    None => Signature::Malformed("unmatched `{` in function body"),
                };
            }
            ";" => return Signature::Prototype { resume: j + 1 },
            _ => {}
        }
    }
    Signature::NotAFunction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn extract(src: &str) -> (Vec<ExtractedFunction>, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();
        let functions = extract_functions(&tokenize(src), &mut diagnostics);
        (functions, diagnostics)
    }

    #[test]
    fn matching_close_counts_nesting() {
        let tokens = tokenize("( a ( b ) ( c ( d ) ) ) e");
        assert_eq!(matching_close(&tokens, 0, "(", ")"), Some(11));
        assert_eq!(matching_close(&tokens, 2, "(", ")"), Some(4));
        assert_eq!(matching_close(&tokens, 1, "(", ")"), None);
        assert_eq!(matching_close(&tokenize("{ {"), 0, "{", "}"), None);
    }

    #[test]
    fn extracts_definitions_and_skips_prototypes() {
        let (functions, diagnostics) = extract(
            "int helper(int a);\nint helper(int a) { return a * 2; }\nint main(void) { int x; x = helper(3); }",
        );
        assert!(diagnostics.is_empty());
        let names: Vec<_> = functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["helper", "main"]);
        assert_eq!(functions[0].args, vec!["int", "a"]);
        assert_eq!(functions[1].args, vec!["void"]);
        assert_eq!(functions[0].body, tokenize("return a * 2;"));
    }

    #[test]
    fn global_declarations_are_not_functions() {
        let (functions, _) = extract("int counter = 0;\nvoid tick() { counter++; }");
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].name, "tick");
    }

    #[test]
    fn falls_back_to_implicit_main() {
        let (functions, _) = extract("x = 1; if (x) { y = 2; }");
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].name, "main");
        assert_eq!(functions[0].body.len(), tokenize("x = 1; if (x) { y = 2; }").len());
    }

    #[test]
    fn unmatched_body_skips_only_that_function() {
        let (functions, diagnostics) =
            extract("void good() { a = 1; } int bad() { if (x) { y = 1; ");
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].name, "good");
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].stage, Stage::Extract);
    }

    #[test]
    fn empty_input_yields_nothing() {
        let (functions, diagnostics) = extract("// only a comment\n#include <stdio.h>\n");
        assert!(functions.is_empty());
        assert!(diagnostics.is_empty());
    }
}
