//! Recursive-descent block parser: function body tokens to pseudocode lines.
//!
//! One left-to-right scan per nesting level. Control constructs recurse one
//! level deeper for their bodies; everything else is consumed up to its `;`.
//! A construct that fails is dropped whole and the scan resumes one token
//! later, so malformed input never stops the rest of the function.

use thiserror::Error;

use crate::extract::matching_close;
use crate::lexer;
use crate::pseudocode::{Construct, DecisionKind, Line, LineKind, LoopKind};
use crate::{Diagnostic, Stage};

/// Keywords that start a declaration line.
pub const DECLARATION_KEYWORDS: [&str; 6] = ["int", "float", "double", "str", "char", "long"];

/// Placeholder target for an input call whose variable could not be found.
pub const UNKNOWN_VARIABLE: &str = "unknown variable";

#[derive(Debug, Error, PartialEq, Eq)]
enum ParseError {
    #[error("expected `{expected}` after `{after}`")]
    Expected { expected: &'static str, after: String },
    #[error("unmatched `{0}`")]
    Unmatched(&'static str),
    #[error("statement has no terminating `;`")]
    MissingSemicolon,
    #[error("stray `{0}`")]
    Stray(String),
}

/// Position after the construct, and the lines it produced.
type Parsed = Result<(usize, Vec<Line>), ParseError>;

/// Parse one function body (or any token slice) at nesting `depth`.
///
/// Failures are recorded in `diagnostics` with token positions relative to
/// `tokens`.
pub fn parse_block(
    tokens: &[String],
    depth: usize,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<Line> {
    let mut parser = BlockParser { tokens, diagnostics };
    parser.block(0, tokens.len(), depth)
}

struct BlockParser<'a> {
    tokens: &'a [String],
    diagnostics: &'a mut Vec<Diagnostic>,
}

impl BlockParser<'_> {
    /// Parse `tokens[start..end]` as a sequence of statements.
    ///
    /// Every statement form returns a position past `pos`. The no-progress
    /// arm is defensive: it keeps the loop finite should a form ever fail to
    /// advance, and is not reachable from the current grammar. Failed
    /// constructs take the error arm and skip a single token.
    fn block(&mut self, start: usize, end: usize, depth: usize) -> Vec<Line> {
        let mut lines = Vec::new();
        let mut pos = start;

        while pos < end {
            match self.statement(pos, end, depth) {
                Ok((next, emitted)) if next > pos => {
                    lines.extend(emitted);
                    pos = next;
                }
                Ok(_) => {
                    tracing::debug!(
                        position = pos,
                        token = %self.tokens[pos],
                        "no progress, forcing one token"
                    );
                    self.diagnostics.push(Diagnostic::new(
                        Stage::Parse,
                        format!("parser stalled on `{}`", self.tokens[pos]),
                        Some(pos),
                    ));
                    pos += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        position = pos,
                        token = %self.tokens[pos],
                        "skipping construct: {err}"
                    );
                    self.diagnostics
                        .push(Diagnostic::new(Stage::Parse, err.to_string(), Some(pos)));
                    pos += 1;
                }
            }
        }

        lines
    }

    fn statement(&mut self, pos: usize, end: usize, depth: usize) -> Parsed {
        let tokens = self.tokens;
        let token = tokens[pos].as_str();
        match token {
            "if" => self.if_chain(pos, end, depth),
            "for" => self.pre_tested(pos, end, depth, LoopKind::For),
            "while" => self.pre_tested(pos, end, depth, LoopKind::While),
            "do" => self.do_while(pos, end, depth),
            "else" | "}" => Err(ParseError::Stray(token.to_string())),
            "{" => {
                // Bare block: flattened into the current level.
                let close = self.close(pos, end, "{", "}")?;
                Ok((close + 1, self.block(pos + 1, close, depth)))
            }
            "printf" | "scanf" => self.io_call(pos, end, depth),
            "fflush" => Ok((self.semicolon(pos, end)? + 1, Vec::new())),
            "return" => {
                let semi = self.semicolon(pos, end)?;
                let text = self.join(pos, semi);
                let lines = match text.as_str() {
                    "return" | "return 0" => Vec::new(),
                    _ => vec![Line::new(depth, LineKind::Generic(text))],
                };
                Ok((semi + 1, lines))
            }
            t if DECLARATION_KEYWORDS.contains(&t) => {
                let semi = self.semicolon(pos, end)?;
                Ok((semi + 1, single(depth, self.join(pos + 1, semi), LineKind::Initialization)))
            }
            _ => self.call_or_generic(pos, end, depth),
        }
    }

    fn if_chain(&mut self, pos: usize, end: usize, depth: usize) -> Parsed {
        let close = self.header_close(pos, end)?;
        let mut lines = vec![Line::new(
            depth,
            LineKind::Decision {
                kind: DecisionKind::If,
                condition: self.join(pos + 2, close),
            },
        )];
        let mut next = self.body(close + 1, end, depth + 1, &mut lines)?;

        while next < end && self.tokens[next] == "else" {
            if next + 1 < end && self.tokens[next + 1] == "if" {
                let close = self.header_close(next + 1, end)?;
                lines.push(Line::new(
                    depth,
                    LineKind::Decision {
                        kind: DecisionKind::ElseIf,
                        condition: self.join(next + 3, close),
                    },
                ));
                next = self.body(close + 1, end, depth + 1, &mut lines)?;
            } else {
                lines.push(Line::new(depth, LineKind::Else));
                next = self.body(next + 1, end, depth + 1, &mut lines)?;
                break;
            }
        }

        lines.push(Line::new(depth, LineKind::Terminator(Construct::If)));
        Ok((next, lines))
    }

    fn pre_tested(&mut self, pos: usize, end: usize, depth: usize, kind: LoopKind) -> Parsed {
        let close = self.header_close(pos, end)?;
        let mut lines = vec![Line::new(
            depth,
            LineKind::Loop {
                kind,
                header: self.join(pos + 2, close),
            },
        )];
        let next = self.body(close + 1, end, depth + 1, &mut lines)?;
        lines.push(Line::new(depth, LineKind::Terminator(Construct::Loop)));
        Ok((next, lines))
    }

    /// `do BODY while (COND);` emits the begin marker, the body, then the
    /// condition.
    fn do_while(&mut self, pos: usize, end: usize, depth: usize) -> Parsed {
        let body_end = self.statement_end(pos + 1, end)?;
        let (condition, next) = self.do_tail(body_end, end)?;

        let mut lines = vec![Line::new(depth, LineKind::DoBegin)];
        self.body(pos + 1, end, depth + 1, &mut lines)?;
        lines.push(Line::new(
            depth,
            LineKind::Decision {
                kind: DecisionKind::DoCondition,
                condition,
            },
        ));
        Ok((next, lines))
    }

    /// Condition text of the `while (...)` following a do body, and the
    /// position after its optional `;`.
    fn do_tail(&self, at: usize, end: usize) -> Result<(String, usize), ParseError> {
        if at >= end || self.tokens[at] != "while" {
            return Err(ParseError::Expected {
                expected: "while",
                after: "do".into(),
            });
        }
        let close = self.header_close(at, end)?;
        let next = if close + 1 < end && self.tokens[close + 1] == ";" {
            close + 2
        } else {
            close + 1
        };
        Ok((self.join(at + 2, close), next))
    }

    fn io_call(&mut self, pos: usize, end: usize, depth: usize) -> Parsed {
        let semi = self.semicolon(pos, end)?;
        let target = self.io_target(pos, semi);
        let kind = match (self.tokens[pos].as_str(), target) {
            ("scanf", Some(target)) => Some(LineKind::Input(target)),
            ("scanf", None) => Some(LineKind::Input(UNKNOWN_VARIABLE.into())),
            (_, Some(target)) => Some(LineKind::Output(target)),
            // A bare format string has nothing worth drawing.
            (_, None) => None,
        };
        Ok((semi + 1, kind.map(|kind| Line::new(depth, kind)).into_iter().collect()))
    }

    /// Argument text after the first top-level comma of the call.
    fn io_target(&self, pos: usize, semi: usize) -> Option<String> {
        if self.tokens.get(pos + 1).map(String::as_str) != Some("(") {
            return None;
        }
        let close = matching_close(&self.tokens[..semi], pos + 1, "(", ")")?;
        let mut nesting = 0usize;
        for k in pos + 2..close {
            match self.tokens[k].as_str() {
                "(" => nesting += 1,
                ")" => nesting = nesting.saturating_sub(1),
                "," if nesting == 0 => {
                    let text = self.join(k + 1, close);
                    return (!text.is_empty()).then_some(text);
                }
                _ => {}
            }
        }
        None
    }

    fn call_or_generic(&mut self, pos: usize, end: usize, depth: usize) -> Parsed {
        let tokens = self.tokens;
        let callee = &tokens[pos];
        if pos + 1 < end && tokens[pos + 1] == "(" && !lexer::is_operator(callee) {
            let close = self.close(pos + 1, end, "(", ")")?;
            if close + 1 < end && tokens[close + 1] == ";" {
                let line = Line::new(
                    depth,
                    LineKind::Call {
                        callee: callee.clone(),
                        args: self.join(pos + 2, close),
                    },
                );
                return Ok((close + 2, vec![line]));
            }
        }
        let semi = self.semicolon(pos, end)?;
        Ok((semi + 1, single(depth, self.join(pos, semi), LineKind::Generic)))
    }

    /// Parse a brace block or a single statement starting at `start`,
    /// appending its lines. Returns the position after the body.
    fn body(
        &mut self,
        start: usize,
        end: usize,
        depth: usize,
        lines: &mut Vec<Line>,
    ) -> Result<usize, ParseError> {
        let stop = self.statement_end(start, end)?;
        if self.tokens[start] == "{" {
            lines.extend(self.block(start + 1, stop - 1, depth));
        } else {
            lines.extend(self.block(start, stop, depth));
        }
        Ok(stop)
    }

    /// Position just past the statement starting at `start`, spanning nested
    /// control bodies completely.
    fn statement_end(&self, start: usize, end: usize) -> Result<usize, ParseError> {
        if start >= end {
            return Err(ParseError::Expected {
                expected: "statement",
                after: self.tokens.get(start.wrapping_sub(1)).cloned().unwrap_or_default(),
            });
        }
        match self.tokens[start].as_str() {
            "{" => Ok(self.close(start, end, "{", "}")? + 1),
            "if" => {
                let close = self.header_close(start, end)?;
                let stop = self.statement_end(close + 1, end)?;
                if stop < end && self.tokens[stop] == "else" {
                    // Covers `else if` too: the nested `if` spans its own chain.
                    return self.statement_end(stop + 1, end);
                }
                Ok(stop)
            }
            "for" | "while" => {
                let close = self.header_close(start, end)?;
                self.statement_end(close + 1, end)
            }
            "do" => {
                let body_end = self.statement_end(start + 1, end)?;
                Ok(self.do_tail(body_end, end)?.1)
            }
            _ => Ok(self.semicolon(start, end)? + 1),
        }
    }

    /// Index of the `)` closing the parenthesised header after a keyword.
    fn header_close(&self, keyword: usize, end: usize) -> Result<usize, ParseError> {
        if keyword + 1 >= end || self.tokens[keyword + 1] != "(" {
            return Err(ParseError::Expected {
                expected: "(",
                after: self.tokens[keyword].clone(),
            });
        }
        self.close(keyword + 1, end, "(", ")")
    }

    fn close(
        &self,
        start: usize,
        end: usize,
        open: &'static str,
        close: &str,
    ) -> Result<usize, ParseError> {
        matching_close(&self.tokens[..end], start, open, close).ok_or(ParseError::Unmatched(open))
    }

    /// First `;` outside parentheses at or after `start`.
    fn semicolon(&self, start: usize, end: usize) -> Result<usize, ParseError> {
        let mut nesting = 0usize;
        for k in start..end {
            match self.tokens[k].as_str() {
                "(" => nesting += 1,
                ")" => nesting = nesting.saturating_sub(1),
                ";" if nesting == 0 => return Ok(k),
                _ => {}
            }
        }
        Err(ParseError::MissingSemicolon)
    }

    fn join(&self, start: usize, end: usize) -> String {
        self.tokens[start..end].join(" ").trim().to_string()
    }
}

fn single(depth: usize, text: String, kind: fn(String) -> LineKind) -> Vec<Line> {
    if text.is_empty() {
        Vec::new()
    } else {
        vec![Line::new(depth, kind(text))]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;

    fn parse(src: &str) -> (Vec<String>, Vec<Diagnostic>) {
        let mut diagnostics = Vec::new();
        let lines = parse_block(&tokenize(src), 0, &mut diagnostics);
        (lines.iter().map(Line::to_string).collect(), diagnostics)
    }

    fn text(src: &str) -> Vec<String> {
        let (lines, diagnostics) = parse(src);
        assert!(diagnostics.is_empty(), "unexpected diagnostics: {diagnostics:?}");
        lines
    }

    #[test]
    fn nested_loops_and_if() {
        assert_eq!(
            text("for(i=0;i<3;i++){while(x<5){if(x==1){y=2;}}}"),
            vec![
                "Repeat for: i = 0 ; i < 3 ; i ++",
                "\tRepeat while: x < 5",
                "\t\tIf: x == 1 then",
                "\t\t\ty = 2",
                "\t\tEnd if",
                "\tEnd repeat",
                "End repeat",
            ]
        );
    }

    #[test]
    fn do_while_places_body_between_markers() {
        assert_eq!(
            text("do { a=1; } while (x<5);"),
            vec!["Repeat (begin)", "\ta = 1", "Repeat while (condition): x < 5"]
        );
        assert_eq!(
            text("do x++; while (x < 5); y = 1;"),
            vec!["Repeat (begin)", "\tx ++", "Repeat while (condition): x < 5", "y = 1"]
        );
    }

    #[test]
    fn else_if_chain_has_one_terminator() {
        assert_eq!(
            text("if (a) {x;} else if (b) {y;} else if (c) {z;} else {w;}"),
            vec![
                "If: a then",
                "\tx",
                "Else if: b then",
                "\ty",
                "Else if: c then",
                "\tz",
                "Else",
                "\tw",
                "End if",
            ]
        );
    }

    #[test]
    fn else_if_condition_uses_balanced_scan() {
        assert_eq!(
            text("if (a) x = 1; else if ((b) && (c)) x = 2;"),
            vec!["If: a then", "\tx = 1", "Else if: ( b ) && ( c ) then", "\tx = 2", "End if"]
        );
    }

    #[test]
    fn single_statement_bodies_span_nested_constructs() {
        assert_eq!(
            text("for (;;) if (a) x = 1; else x = 2; done();"),
            vec![
                "Repeat for: ; ;",
                "\tIf: a then",
                "\t\tx = 1",
                "\tElse",
                "\t\tx = 2",
                "\tEnd if",
                "End repeat",
                "Call: done()",
            ]
        );
    }

    #[test]
    fn io_targets() {
        assert_eq!(text("scanf(\"%d\", &x);"), vec!["Input: &x"]);
        assert!(text("printf(\"no args\");").is_empty());
        assert_eq!(text("printf(\"%d\\n\", f(x, y));"), vec!["Output: f ( x , y )"]);
        assert_eq!(text("scanf(fmt);"), vec![format!("Input: {UNKNOWN_VARIABLE}")]);
    }

    #[test]
    fn suppressed_returns() {
        assert!(text("return 0;").is_empty());
        assert!(text("return;").is_empty());
        assert_eq!(text("return x+1;"), vec!["return x + 1"]);
        assert_eq!(text("return (x);"), vec!["return ( x )"]);
    }

    #[test]
    fn declarations_calls_and_skips() {
        assert_eq!(
            text("int x = 5; fflush(stdin); foo(a, b); ; { y = x; }"),
            vec!["Initialize: x = 5", "Call: foo(a , b)", "y = x"]
        );
    }

    #[test]
    fn call_used_in_expression_is_generic() {
        assert_eq!(text("f(x) + 1;"), vec!["f ( x ) + 1"]);
    }

    #[test]
    fn missing_paren_skips_only_that_construct() {
        let (lines, diagnostics) = parse("while x < 5 { y = 1; } z = 2;");
        assert!(!diagnostics.is_empty());
        assert!(diagnostics.iter().all(|d| d.stage == Stage::Parse));
        assert_eq!(lines.last().map(String::as_str), Some("z = 2"));
    }

    #[test]
    fn do_without_while_is_skipped() {
        let (lines, diagnostics) = parse("do { a = 1; } b = 2;");
        assert_eq!(diagnostics[0].message, "expected `while` after `do`");
        assert!(!lines.iter().any(|l| l.starts_with("Repeat")));
        assert_eq!(lines.last().map(String::as_str), Some("b = 2"));
    }

    #[test]
    fn stray_tokens_are_reported() {
        let (lines, diagnostics) = parse("} else x = 1;");
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(lines, vec!["x = 1"]);
    }

    #[test]
    fn unterminated_statement_skips_token_by_token() {
        let (lines, diagnostics) = parse("x = 1");
        assert!(lines.is_empty());
        assert_eq!(diagnostics.len(), 3);
    }
}
