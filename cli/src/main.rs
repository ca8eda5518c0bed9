use std::{
    fs,
    path::{Path, PathBuf},
};

mod svg;

use anyhow::{anyhow, bail, Context};
use blockflow_core::{
    export, layout, parse_program, program_from_pseudocode, Diagnostic, Diagram, FunctionRecord,
    LayoutConfig, Line, Program,
};
use clap::{ArgAction, Parser, ValueEnum};
use console::style;
use serde::Serialize;
use serde_yaml::Value as YamlValue;
use tracing_subscriber::EnvFilter;

/// blockflow CLI entry point.
#[derive(Debug, Parser)]
#[command(name = "blockflow", about = "Turn C functions into block pseudocode and flowcharts.")]
struct Args {
    /// C source file, or a saved pseudocode export with --from-pseudocode.
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Function to render. Defaults to main, else the first function found.
    #[arg(long, value_name = "NAME")]
    function: Option<String>,

    /// List the functions found and exit.
    #[arg(long, action = ArgAction::SetTrue)]
    list: bool,

    /// Output format.
    #[arg(long, value_enum, default_value_t = Format::Pseudocode)]
    format: Format,

    /// Write output here instead of stdout.
    #[arg(long, short, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Path to layout config file (YAML). Defaults to blockflow.yml if present.
    #[arg(long, default_value = "blockflow.yml")]
    config: PathBuf,

    /// Horizontal scale factor.
    #[arg(long, value_name = "FACTOR")]
    h_scale: Option<f64>,

    /// Vertical scale factor.
    #[arg(long, value_name = "FACTOR")]
    v_scale: Option<f64>,

    /// Multiplier on loop back and exit edge offsets.
    #[arg(long, value_name = "FACTOR")]
    loop_offset: Option<f64>,

    /// Multiplier on if-branch offsets.
    #[arg(long, value_name = "FACTOR")]
    if_offset: Option<f64>,

    /// Hide declaration (Initialize) lines in diagrams.
    #[arg(long, action = ArgAction::SetTrue)]
    skip_init: bool,

    /// Treat FILE as a pseudocode text export instead of C source.
    #[arg(long, action = ArgAction::SetTrue)]
    from_pseudocode: bool,

    /// Set config overrides (repeatable as key=value). Example: --set spacing.v_gap=80
    #[arg(long = "set", value_name = "KEY=VALUE", action = ArgAction::Append)]
    sets: Vec<String>,

    /// Exit non-zero when any construct was skipped.
    #[arg(long, action = ArgAction::SetTrue)]
    strict: bool,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(long, short, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Pseudocode,
    Json,
    Drawio,
    Svg,
}

#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    function: &'a str,
    lines: &'a [Line],
    diagram: &'a Diagram,
}

#[derive(Debug, Serialize)]
struct FunctionSummary<'a> {
    name: &'a str,
    lines: usize,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = match args.verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    run(args)
}

fn run(args: Args) -> anyhow::Result<()> {
    let mut cfg = load_config(&args.config)?;
    apply_flags(&mut cfg, &args);
    apply_overrides(&mut cfg, &args.sets)?;
    cfg.validate().context("Invalid layout settings")?;

    let source = fs::read_to_string(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let program = if args.from_pseudocode {
        let name = args
            .file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "main".to_string());
        program_from_pseudocode(&name, &source)
    } else {
        parse_program(&source)
    };
    tracing::info!(
        file = %args.file.display(),
        functions = program.functions.len(),
        "parsed source"
    );

    if args.list {
        print_functions(&program, args.format)?;
        report_diagnostics(&args.file, &program.diagnostics);
        return finish(&args, program.diagnostics.len());
    }

    let function = select_function(&program, args.function.as_deref())?;
    let (output, diagram_diagnostics) = match args.format {
        Format::Pseudocode => (export::pseudocode_text(&function.lines) + "\n", Vec::new()),
        Format::Json => {
            let diagram = layout(&function.lines, &cfg);
            let report = JsonReport {
                function: &function.name,
                lines: &function.lines,
                diagram: &diagram,
            };
            let text = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
            (text + "\n", diagram.diagnostics)
        }
        Format::Drawio => {
            let diagram = layout(&function.lines, &cfg);
            let xml = export::drawio_xml(&diagram, &function.name)?;
            (xml, diagram.diagnostics)
        }
        Format::Svg => {
            let diagram = layout(&function.lines, &cfg);
            (svg::render(&diagram), diagram.diagnostics)
        }
    };

    match &args.output {
        Some(path) => {
            fs::write(path, &output)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            eprintln!(
                "{} {} ({})",
                style("wrote").green(),
                style(path.display()).bold(),
                function.name
            );
        }
        None => print!("{output}"),
    }

    let diagnostics: Vec<Diagnostic> = program
        .diagnostics
        .iter()
        .cloned()
        .chain(diagram_diagnostics)
        .collect();
    report_diagnostics(&args.file, &diagnostics);
    finish(&args, diagnostics.len())
}

fn finish(args: &Args, diagnostics: usize) -> anyhow::Result<()> {
    if args.strict && diagnostics > 0 {
        bail!("{diagnostics} construct(s) were skipped");
    }
    Ok(())
}

fn select_function<'a>(
    program: &'a Program,
    name: Option<&str>,
) -> anyhow::Result<&'a FunctionRecord> {
    match name {
        Some(name) => program.function(name).ok_or_else(|| {
            let known: Vec<&str> = program.names().collect();
            anyhow!("Function `{name}` not found (available: {})", known.join(", "))
        }),
        None => program
            .default_function()
            .ok_or_else(|| anyhow!("No functions found")),
    }
}

fn print_functions(program: &Program, format: Format) -> anyhow::Result<()> {
    if format == Format::Json {
        let summary: Vec<FunctionSummary> = program
            .functions
            .iter()
            .map(|f| FunctionSummary {
                name: &f.name,
                lines: f.lines.len(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    for f in &program.functions {
        println!("{} ({} lines)", style(&f.name).bold(), f.lines.len());
    }
    Ok(())
}

fn report_diagnostics(path: &Path, diagnostics: &[Diagnostic]) {
    if diagnostics.is_empty() {
        return;
    }
    eprintln!(
        "{} ({} skipped)",
        style(path.to_string_lossy()).bold(),
        diagnostics.len()
    );
    for diag in diagnostics {
        let position = diag.position.map(|p| format!(" #{p}")).unwrap_or_default();
        eprintln!("  [{}]{} {}", style(diag.stage).yellow(), position, diag.message);
    }
}

fn load_config(path: &Path) -> anyhow::Result<LayoutConfig> {
    if path.exists() {
        blockflow_core::load_config(path)
    } else {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        Ok(LayoutConfig::default())
    }
}

fn apply_flags(cfg: &mut LayoutConfig, args: &Args) {
    if let Some(v) = args.h_scale {
        cfg.h_scale = v;
    }
    if let Some(v) = args.v_scale {
        cfg.v_scale = v;
    }
    if let Some(v) = args.loop_offset {
        cfg.loop_offset_factor = v;
    }
    if let Some(v) = args.if_offset {
        cfg.if_offset_factor = v;
    }
    if args.skip_init {
        cfg.skip_initializations = true;
    }
}

/// Apply `key=value` overrides. Keys are dotted paths into the config
/// (`spacing.v_gap`, `palette.decision`); values are parsed as YAML scalars.
fn apply_overrides(cfg: &mut LayoutConfig, sets: &[String]) -> anyhow::Result<()> {
    if sets.is_empty() {
        return Ok(());
    }
    let mut root = serde_yaml::to_value(&*cfg).context("Failed to serialize config")?;
    for kv in sets {
        let mut parts = kv.splitn(2, '=');
        let key = parts.next().unwrap_or("").trim();
        let val = parts.next().unwrap_or("").trim();
        if key.is_empty() {
            continue;
        }
        let mut node = &mut root;
        for segment in key.split('.') {
            node = node
                .get_mut(segment)
                .ok_or_else(|| anyhow!("Unknown config key `{key}`"))?;
        }
        // Colours like `#FFFFFF` read as YAML comments; keep them as text.
        *node = match serde_yaml::from_str::<YamlValue>(val) {
            Ok(value) if !value.is_null() => value,
            _ => YamlValue::String(val.to_string()),
        };
    }
    *cfg = serde_yaml::from_value(root).context("Invalid config override")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_reach_nested_keys() {
        let mut cfg = LayoutConfig::default();
        apply_overrides(
            &mut cfg,
            &[
                "spacing.v_gap=80".into(),
                "palette.decision=#FFFFFF".into(),
                "skip_initializations=true".into(),
            ],
        )
        .unwrap();
        assert_eq!(cfg.spacing.v_gap, 80.0);
        assert_eq!(cfg.palette.decision, "#FFFFFF");
        assert!(cfg.skip_initializations);
    }

    #[test]
    fn unknown_override_key_is_an_error() {
        let mut cfg = LayoutConfig::default();
        let err = apply_overrides(&mut cfg, &["spacing.nope=1".into()]).unwrap_err();
        assert!(err.to_string().contains("spacing.nope"));
    }

    #[test]
    fn flags_override_config() {
        let args = Args::parse_from([
            "blockflow",
            "in.c",
            "--h-scale",
            "1.5",
            "--skip-init",
            "--format",
            "drawio",
        ]);
        let mut cfg = LayoutConfig::default();
        apply_flags(&mut cfg, &args);
        assert_eq!(cfg.h_scale, 1.5);
        assert_eq!(cfg.v_scale, 1.0);
        assert!(cfg.skip_initializations);
        assert_eq!(args.format, Format::Drawio);
    }

    #[test]
    fn set_takes_one_pair_per_occurrence() {
        let args = Args::parse_from([
            "blockflow",
            "--set",
            "spacing.v_gap=80",
            "in.c",
            "--set",
            "h_scale=2",
        ]);
        assert_eq!(args.file, PathBuf::from("in.c"));
        assert_eq!(args.sets, vec!["spacing.v_gap=80", "h_scale=2"]);
    }

    #[test]
    fn selects_named_or_default_function() {
        let program = parse_program("int helper() { x = 1; } int main() { y = 2; }");
        assert_eq!(select_function(&program, None).unwrap().name, "main");
        assert_eq!(select_function(&program, Some("helper")).unwrap().name, "helper");
        let err = select_function(&program, Some("missing")).unwrap_err();
        assert!(err.to_string().contains("helper, main"));
    }
}
