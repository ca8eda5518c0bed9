//! blockflow core engine.
//! Converts restricted C source into block pseudocode and lays that
//! pseudocode out as a flowchart of shapes, edges and anchors.
//!
//! The pipeline is `lexer` -> `extract` -> `parser` (+ `locate`) producing a
//! [`Program`]; each function's [`pseudocode::Line`] sequence then goes
//! through [`layout::layout`], which places shapes and edges and snaps edge
//! endpoints onto shape anchors.

use serde::{Deserialize, Serialize};

pub mod config;
pub mod export;
pub mod extract;
pub mod geometry;
pub mod layout;
pub mod lexer;
pub mod locate;
pub mod parser;
pub mod pseudocode;
pub mod shape;
pub mod snap;

pub use config::{load_config, LayoutConfig, Palette, Spacing};
pub use layout::{layout, layout_with, Diagram, Edge, EdgeId, EdgeLabel, LayoutSession};
pub use pseudocode::{Construct, DecisionKind, Line, LineKind, LoopKind};
pub use shape::{Anchor, MonospaceMeasure, Shape, ShapeId, ShapeKind, Side, TextMeasure};

/// Arguments longer than this are shortened in begin/end markers.
const SIGNATURE_ARGS_LIMIT: usize = 30;

/// Pipeline stage a diagnostic was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Lex,
    Extract,
    Parse,
    Layout,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Lex => "lex",
            Stage::Extract => "extract",
            Stage::Parse => "parse",
            Stage::Layout => "layout",
        };
        f.write_str(name)
    }
}

/// A recovered failure. Never fatal; surfaced for the operator to report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub stage: Stage,
    pub message: String,
    /// Token index (lex/extract/parse) or line index (layout), when known.
    pub position: Option<usize>,
}

impl Diagnostic {
    pub fn new(stage: Stage, message: impl Into<String>, position: Option<usize>) -> Self {
        Self {
            stage,
            message: message.into(),
            position,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.position {
            Some(pos) => write!(f, "[{}] #{}: {}", self.stage, pos, self.message),
            None => write!(f, "[{}] {}", self.stage, self.message),
        }
    }
}

/// Pseudocode for one function, entry and exit markers included.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub name: String,
    pub lines: Vec<Line>,
}

/// Every function found in a source file, in source order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    pub functions: Vec<FunctionRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Program {
    pub fn function(&self, name: &str) -> Option<&FunctionRecord> {
        self.functions.iter().find(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.iter().map(|f| f.name.as_str())
    }

    /// `main` when present, otherwise the first function.
    pub fn default_function(&self) -> Option<&FunctionRecord> {
        self.function("main").or_else(|| self.functions.first())
    }

    fn insert(&mut self, record: FunctionRecord) {
        match self.functions.iter_mut().find(|f| f.name == record.name) {
            Some(existing) => *existing = record,
            None => self.functions.push(record),
        }
    }
}

/// Run the parsing half of the pipeline over a whole source file.
pub fn parse_program(source: &str) -> Program {
    let mut program = Program::default();
    let tokens = lexer::tokenize_reporting(source, &mut program.diagnostics);
    let functions = extract::extract_functions(&tokens, &mut program.diagnostics);

    for function in functions {
        let body = parser::parse_block(&function.body, 0, &mut program.diagnostics);
        let signature = if function.name == "main" {
            None
        } else {
            Some(signature(&function.name, &function.args))
        };

        let mut lines = Vec::with_capacity(body.len() + 2);
        lines.push(Line::new(0, LineKind::Begin(signature.clone())));
        lines.extend(body);
        lines.push(Line::new(0, LineKind::End(signature)));

        program.insert(FunctionRecord {
            name: function.name,
            lines,
        });
    }

    program
}

/// Build a single-function program from a saved pseudocode text export.
pub fn program_from_pseudocode(name: &str, text: &str) -> Program {
    Program {
        functions: vec![FunctionRecord {
            name: name.to_string(),
            lines: pseudocode::parse_text(text),
        }],
        diagnostics: Vec::new(),
    }
}

fn signature(name: &str, args: &[String]) -> String {
    let mut joined = args.join(" ");
    if joined.chars().count() > SIGNATURE_ARGS_LIMIT {
        joined = joined.chars().take(SIGNATURE_ARGS_LIMIT - 3).collect::<String>() + "...";
    }
    format!("{name}({joined})")
}
