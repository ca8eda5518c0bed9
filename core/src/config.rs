//! Layout configuration: scale factors, spacing constants and fill colours.

use std::path::Path;

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::geometry::Point;
use crate::shape::ShapeKind;

/// Everything the layout engine can be tuned with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Horizontal scale applied to widths and horizontal offsets
    pub h_scale: f64,
    /// Vertical scale applied to heights, gaps and font sizes
    pub v_scale: f64,
    /// Multiplier on loop back/exit edge offsets
    pub loop_offset_factor: f64,
    /// Multiplier on if-branch offsets
    pub if_offset_factor: f64,
    /// Hide declaration lines
    pub skip_initializations: bool,
    /// Top centre of the first shape
    pub origin: Point,
    /// Snap radius for edge endpoints at unit scale, inclusive. Shrinks with
    /// the smaller of the two scale factors.
    pub snap_tolerance: f64,
    pub palette: Palette,
    pub spacing: Spacing,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            h_scale: 1.0,
            v_scale: 1.0,
            loop_offset_factor: 1.0,
            if_offset_factor: 1.0,
            skip_initializations: false,
            origin: Point::new(1000.0, 50.0),
            snap_tolerance: 25.0,
            palette: Palette::default(),
            spacing: Spacing::default(),
        }
    }
}

/// Fill colour per shape kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub terminal: String,
    pub process: String,
    pub decision: String,
    pub call: String,
    pub io: String,
    pub loop_header: String,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            terminal: "#FFD1DC".into(),
            process: "#ADD8E6".into(),
            decision: "#FFFFE0".into(),
            call: "#CCEEFF".into(),
            io: "#CCEEFF".into(),
            loop_header: "#D8BFD8".into(),
        }
    }
}

impl Palette {
    pub fn fill(&self, kind: ShapeKind) -> &str {
        match kind {
            ShapeKind::Terminal => &self.terminal,
            ShapeKind::Process => &self.process,
            ShapeKind::Decision => &self.decision,
            ShapeKind::Call => &self.call,
            ShapeKind::Io => &self.io,
            ShapeKind::Loop => &self.loop_header,
        }
    }
}

/// Unscaled layout constants, in pixels unless noted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Spacing {
    pub block_width: f64,
    pub block_height: f64,
    /// Gap between stacked shapes
    pub v_gap: f64,
    /// Drop from a decision to the first shape of its branch
    pub branch_gap: f64,
    /// Horizontal offset of if branches at depth 0
    pub base_h_offset: f64,
    /// Per-level step used by loop edge offsets
    pub nest_step: f64,
    /// Factor by which branch offsets shrink per nesting level
    pub branch_decay: f64,
    /// Branch offsets never drop below this share of the block width
    pub min_branch_ratio: f64,
    /// Minimum horizontal clearance between sibling branches
    pub clearance: f64,
    /// Loop back-edge spread for `for` loops
    pub for_back_spread: f64,
    /// Loop back-edge spread for `while` loops
    pub while_back_spread: f64,
    pub font_size: f64,
    pub terminal_font_size: f64,
}

impl Default for Spacing {
    fn default() -> Self {
        Self {
            block_width: 200.0,
            block_height: 65.0,
            v_gap: 50.0,
            branch_gap: 30.0,
            base_h_offset: 270.0,
            nest_step: 70.0,
            branch_decay: 0.8,
            min_branch_ratio: 0.6,
            clearance: 20.0,
            for_back_spread: 1.25,
            while_back_spread: 1.0,
            font_size: 14.0,
            terminal_font_size: 11.0,
        }
    }
}

impl LayoutConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("Invalid layout config")
    }

    /// Reject values that would collapse or invert the diagram.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("h_scale", self.h_scale),
            ("v_scale", self.v_scale),
            ("spacing.block_width", self.spacing.block_width),
            ("spacing.block_height", self.spacing.block_height),
            ("spacing.font_size", self.spacing.font_size),
        ] {
            ensure!(value.is_finite() && value > 0.0, "{name} must be positive, got {value}");
        }
        for (name, value) in [
            ("loop_offset_factor", self.loop_offset_factor),
            ("if_offset_factor", self.if_offset_factor),
            ("snap_tolerance", self.snap_tolerance),
        ] {
            ensure!(value.is_finite() && value >= 0.0, "{name} must not be negative, got {value}");
        }
        Ok(())
    }
}

/// Load a YAML layout config file.
pub fn load_config(path: &Path) -> Result<LayoutConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: LayoutConfig = serde_yaml::from_str(&text)
        .with_context(|| format!("Invalid layout config in {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("Invalid layout config in {}", path.display()))?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = LayoutConfig::from_yaml_str(
            "h_scale: 1.5\nspacing:\n  v_gap: 80\npalette:\n  decision: \"#FFFFFF\"\n",
        )
            .expect("valid yaml");
        assert_eq!(config.h_scale, 1.5);
        assert_eq!(config.v_scale, 1.0);
        assert_eq!(config.spacing.v_gap, 80.0);
        assert_eq!(config.spacing.block_width, 200.0);
        assert_eq!(config.palette.fill(ShapeKind::Decision), "#FFFFFF");
        assert_eq!(config.palette.fill(ShapeKind::Terminal), "#FFD1DC");
    }

    #[test]
    fn empty_document_is_default() {
        let config = LayoutConfig::from_yaml_str("{}").expect("valid yaml");
        assert_eq!(config, LayoutConfig::default());
    }

    #[test]
    fn validation_rejects_non_positive_scale() {
        let config = LayoutConfig {
            v_scale: 0.0,
            ..LayoutConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("v_scale"));
        assert!(LayoutConfig::default().validate().is_ok());
    }

    #[test]
    fn missing_file_has_context() {
        let err = load_config(Path::new("/definitely/not/here.yml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config"));
    }
}
