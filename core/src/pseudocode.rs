//! Tagged pseudocode lines.
//!
//! The parser emits [`Line`]s; the locators and the layout engine dispatch on
//! [`LineKind`] directly. The plain-text form (`Display` / `FromStr`) is the
//! stable export format and can be read back.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One pseudocode line with its nesting depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Line {
    /// Recursion depth at emission time
    pub depth: usize,
    /// What the line is
    pub kind: LineKind,
}

/// Classification of a pseudocode line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineKind {
    /// Function entry; `None` for `main`
    Begin(Option<String>),
    /// Function exit; `None` for `main`
    End(Option<String>),
    /// Variable declaration
    Initialization(String),
    /// Value read from the user (`scanf` target)
    Input(String),
    /// Value shown to the user (`printf` argument)
    Output(String),
    /// Bare function call statement
    Call { callee: String, args: String },
    /// Conditional test
    Decision { kind: DecisionKind, condition: String },
    /// Pre-tested loop header
    Loop { kind: LoopKind, header: String },
    /// Start of a post-tested loop body
    DoBegin,
    /// Plain `else` clause of an if chain
    Else,
    /// Closes an if chain or a pre-tested loop
    Terminator(Construct),
    /// Any other statement, verbatim
    Generic(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DecisionKind {
    If,
    ElseIf,
    /// Trailing `while (...)` of a do-while; closes its `DoBegin`
    DoCondition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoopKind {
    For,
    While,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Construct {
    If,
    Loop,
}

impl Line {
    pub fn new(depth: usize, kind: LineKind) -> Self {
        Self { depth, kind }
    }

    /// Opens a construct that a locator must balance.
    pub fn is_opener(&self) -> bool {
        matches!(
            self.kind,
            LineKind::Decision {
                kind: DecisionKind::If,
                ..
            } | LineKind::Loop { .. }
                | LineKind::DoBegin
        )
    }

    /// Closes a construct opened by [`Line::is_opener`].
    pub fn is_closer(&self) -> bool {
        matches!(
            self.kind,
            LineKind::Terminator(_) | LineKind::Decision { kind: DecisionKind::DoCondition, .. }
        )
    }

    /// `else` or `else if` clause of an if chain.
    pub fn is_else_clause(&self) -> bool {
        matches!(
            self.kind,
            LineKind::Else | LineKind::Decision { kind: DecisionKind::ElseIf, .. }
        )
    }

    /// Text drawn inside the line's shape, without the kind prefix where the
    /// shape already conveys it.
    pub fn label(&self) -> String {
        match &self.kind {
            LineKind::Call { callee, args } => format!("{callee}({args})"),
            LineKind::Decision { condition, .. } => condition.clone(),
            LineKind::Loop { header, .. } => header.clone(),
            _ => self.kind.to_string(),
        }
    }
}

impl fmt::Display for LineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineKind::Begin(None) => f.write_str("Begin"),
            LineKind::Begin(Some(sig)) => write!(f, "Begin: {sig}"),
            LineKind::End(None) => f.write_str("End"),
            LineKind::End(Some(sig)) => write!(f, "End: {sig}"),
            LineKind::Initialization(text) => write!(f, "Initialize: {text}"),
            LineKind::Input(target) => write!(f, "Input: {target}"),
            LineKind::Output(target) => write!(f, "Output: {target}"),
            LineKind::Call { callee, args } => write!(f, "Call: {callee}({args})"),
            LineKind::Decision {
                kind: DecisionKind::If,
                condition,
            } => write!(f, "If: {condition} then"),
            LineKind::Decision { kind: DecisionKind::ElseIf, condition } => {
                write!(f, "Else if: {condition} then")
            }
            LineKind::Decision { kind: DecisionKind::DoCondition, condition } => {
                write!(f, "Repeat while (condition): {condition}")
            }
            LineKind::Loop { kind: LoopKind::For, header } => write!(f, "Repeat for: {header}"),
            LineKind::Loop { kind: LoopKind::While, header } => write!(f, "Repeat while: {header}"),
            LineKind::DoBegin => f.write_str("Repeat (begin)"),
            LineKind::Else => f.write_str("Else"),
            LineKind::Terminator(Construct::If) => f.write_str("End if"),
            LineKind::Terminator(Construct::Loop) => f.write_str("End repeat"),
            LineKind::Generic(text) => f.write_str(text),
        }
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for _ in 0..self.depth {
            f.write_str("\t")?;
        }
        write!(f, "{}", self.kind)
    }
}

impl FromStr for LineKind {
    type Err = Infallible;

    /// Never fails: unrecognised text is a generic statement.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let kind = match s {
            "Begin" => LineKind::Begin(None),
            "End" => LineKind::End(None),
            "Repeat (begin)" => LineKind::DoBegin,
            "Else" => LineKind::Else,
            "End if" => LineKind::Terminator(Construct::If),
            "End repeat" => LineKind::Terminator(Construct::Loop),
            _ => return Ok(parse_prefixed(s)),
        };
        Ok(kind)
    }
}

fn parse_prefixed(s: &str) -> LineKind {
    let owned = |rest: &str| rest.trim().to_string();

    if let Some(rest) = s.strip_prefix("Begin: ") {
        return LineKind::Begin(Some(owned(rest)));
    }
    if let Some(rest) = s.strip_prefix("End: ") {
        return LineKind::End(Some(owned(rest)));
    }
    if let Some(rest) = s.strip_prefix("Initialize: ") {
        return LineKind::Initialization(owned(rest));
    }
    if let Some(rest) = s.strip_prefix("Input: ") {
        return LineKind::Input(owned(rest));
    }
    if let Some(rest) = s.strip_prefix("Output: ") {
        return LineKind::Output(owned(rest));
    }
    if let Some(rest) = s.strip_prefix("Call: ") {
        if let (Some(open), true) = (rest.find('('), rest.ends_with(')')) {
            return LineKind::Call {
                callee: rest[..open].trim().to_string(),
                args: rest[open + 1..rest.len() - 1].trim().to_string(),
            };
        }
    }
    if let Some(rest) = s.strip_prefix("If: ") {
        return decision(DecisionKind::If, rest);
    }
    if let Some(rest) = s.strip_prefix("Else if: ") {
        return decision(DecisionKind::ElseIf, rest);
    }
    // Longer prefix first: "Repeat while (condition):" also starts with "Repeat while".
    if let Some(rest) = s.strip_prefix("Repeat while (condition): ") {
        return LineKind::Decision {
            kind: DecisionKind::DoCondition,
            condition: owned(rest),
        };
    }
    if let Some(rest) = s.strip_prefix("Repeat while: ") {
        return LineKind::Loop {
            kind: LoopKind::While,
            header: owned(rest),
        };
    }
    if let Some(rest) = s.strip_prefix("Repeat for: ") {
        return LineKind::Loop {
            kind: LoopKind::For,
            header: owned(rest),
        };
    }
    LineKind::Generic(s.to_string())
}

fn decision(kind: DecisionKind, rest: &str) -> LineKind {
    let condition = rest.strip_suffix(" then").unwrap_or(rest).trim().to_string();
    LineKind::Decision { kind, condition }
}

impl FromStr for Line {
    type Err = Infallible;

    /// Depth is the number of leading tab characters.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let depth = s.chars().take_while(|c| *c == '\t').count();
        let kind = s[depth..].parse()?;
        Ok(Line { depth, kind })
    }
}

/// Read a saved text export back into lines. Blank lines are skipped.
pub fn parse_text(text: &str) -> Vec<Line> {
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| l.parse().ok())
        .collect()
}

/// Render lines in the text export form, one per line.
pub fn render_text(lines: &[Line]) -> String {
    lines.iter().map(Line::to_string).collect::<Vec<_>>().join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Line> {
        vec![
            Line::new(0, LineKind::Begin(None)),
            Line::new(0, LineKind::Initialization("x".into())),
            Line::new(0, LineKind::Input("&x".into())),
            Line::new(
                0,
                LineKind::Loop {
                    kind: LoopKind::For,
                    header: "i = 0 ; i < 3 ; i ++".into(),
                },
            ),
            Line::new(
                1,
                LineKind::Decision {
                    kind: DecisionKind::If,
                    condition: "x == 1".into(),
                },
            ),
            Line::new(
                2,
                LineKind::Call {
                    callee: "foo".into(),
                    args: "x , 2".into(),
                },
            ),
            Line::new(1, LineKind::Else),
            Line::new(2, LineKind::Output("x".into())),
            Line::new(1, LineKind::Terminator(Construct::If)),
            Line::new(0, LineKind::Terminator(Construct::Loop)),
            Line::new(0, LineKind::DoBegin),
            Line::new(1, LineKind::Generic("x ++".into())),
            Line::new(
                0,
                LineKind::Decision {
                    kind: DecisionKind::DoCondition,
                    condition: "x < 5".into(),
                },
            ),
            Line::new(
                0,
                LineKind::Loop {
                    kind: LoopKind::While,
                    header: "x > 0".into(),
                },
            ),
            Line::new(1, LineKind::Generic("x --".into())),
            Line::new(0, LineKind::Terminator(Construct::Loop)),
            Line::new(0, LineKind::End(None)),
        ]
    }

    #[test]
    fn renders_text_form() {
        let text = render_text(&sample());
        let expected = "Begin\nInitialize: x\nInput: &x\nRepeat for: i = 0 ; i < 3 ; i ++\n\tIf: x == 1 then\n\t\tCall: foo(x , 2)\n\tElse\n\t\tOutput: x\n\tEnd if\nEnd repeat\nRepeat (begin)\n\tx ++\nRepeat while (condition): x < 5\nRepeat while: x > 0\n\tx --\nEnd repeat\nEnd";
        assert_eq!(text, expected);
    }

    #[test]
    fn text_form_reads_back() {
        let lines = sample();
        assert_eq!(parse_text(&render_text(&lines)), lines);
    }

    #[test]
    fn signatures_survive_text_form() {
        let line: Line = "Begin: add(int a , int b)".parse().unwrap();
        assert_eq!(line.kind, LineKind::Begin(Some("add(int a , int b)".into())));
        let line: Line = "\tEnd: add(int a , int b)".parse().unwrap();
        assert_eq!(line.depth, 1);
        assert_eq!(line.kind, LineKind::End(Some("add(int a , int b)".into())));
    }

    #[test]
    fn unknown_text_is_generic() {
        let line: Line = "\t\treturn x + 1".parse().unwrap();
        assert_eq!(line, Line::new(2, LineKind::Generic("return x + 1".into())));
        assert_eq!(parse_text("\n   \nEnd\n").len(), 1);
    }

    #[test]
    fn classifies_openers_and_closers() {
        let lines = sample();
        let openers: Vec<usize> = (0..lines.len()).filter(|&i| lines[i].is_opener()).collect();
        let closers: Vec<usize> = (0..lines.len()).filter(|&i| lines[i].is_closer()).collect();
        assert_eq!(openers, vec![3, 4, 10, 13]);
        assert_eq!(closers, vec![8, 9, 12, 15]);
        assert!(lines[6].is_else_clause());
    }

    #[test]
    fn labels_drop_prefixes_for_decisions() {
        let lines = sample();
        assert_eq!(lines[4].label(), "x == 1");
        assert_eq!(lines[5].label(), "foo(x , 2)");
        assert_eq!(lines[2].label(), "Input: &x");
        assert_eq!(lines[3].label(), "i = 0 ; i < 3 ; i ++");
    }
}
