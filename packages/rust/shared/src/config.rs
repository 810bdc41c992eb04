//! Application configuration for diagramlens.
//!
//! User config lives at `~/.diagramlens/diagramlens.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DiagramLensError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "diagramlens.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".diagramlens";

// ---------------------------------------------------------------------------
// Config structs (matching diagramlens.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Diagram engine selection.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Theme environment.
    #[serde(default)]
    pub theme: ThemeConfig,

    /// Pipeline behaviour.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Editor-page sidebar injection.
    #[serde(default)]
    pub augment: AugmentConfig,

    /// Extra transformation rules appended after the built-in ones.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// Which diagram engine renders extracted source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    /// POST the source to a Kroki server and embed the returned SVG.
    #[default]
    Kroki,
    /// Emit `<pre class="mermaid">` markup for client-side mermaid.js.
    Passthrough,
}

/// `[engine]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub kind: EngineKind,

    /// Kroki server base URL.
    #[serde(default = "default_kroki_url")]
    pub kroki_url: String,

    /// Per-render request timeout.
    #[serde(default = "default_engine_timeout")]
    pub timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::default(),
            kroki_url: default_kroki_url(),
            timeout_secs: default_engine_timeout(),
        }
    }
}

fn default_kroki_url() -> String {
    "https://kroki.io".into()
}
fn default_engine_timeout() -> u64 {
    30
}

/// `[theme]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThemeConfig {
    /// Whether the environment reports `prefers-color-scheme: dark`.
    #[serde(default)]
    pub prefers_dark: bool,
}

/// How elements inserted after load are surfaced to the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InsertionSignalKind {
    /// A named CSS animation that starts on every candidate element.
    #[default]
    Animation,
    /// A mutation observer on the document root.
    DocumentObserver,
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Remove the raw source block once it has been rendered.
    #[serde(default = "default_true")]
    pub remove_source: bool,

    #[serde(default)]
    pub insertion_signal: InsertionSignalKind,

    /// Animation name that marks inserted diagram source.
    #[serde(default = "default_animation_name")]
    pub animation_name: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            remove_source: true,
            insertion_signal: InsertionSignalKind::default(),
            animation_name: default_animation_name(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_animation_name() -> String {
    "mermaidDiagramCodeInserted".into()
}

/// `[augment]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AugmentConfig {
    /// Sidebar fetch timeout.
    #[serde(default = "default_augment_timeout")]
    pub timeout_secs: u64,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_augment_timeout(),
        }
    }
}

fn default_augment_timeout() -> u64 {
    10
}

/// Handler variant for a configured rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HandlerKind {
    Render,
    Augment,
}

/// `[[rules]]` entry: a user-defined transformation rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Rule name used in logs.
    pub name: String,
    /// Regex matched against the page URL.
    pub site: String,
    /// Selector for the element that owns the source block.
    pub parent: String,
    /// Selector, within the parent, for the element carrying the text.
    pub child: String,
    /// Optional extraction regex; capture group 1 is the diagram source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    pub handler: HandlerKind,
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.diagramlens/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| DiagramLensError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.diagramlens/diagramlens.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| DiagramLensError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        DiagramLensError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| DiagramLensError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| DiagramLensError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| DiagramLensError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("kroki_url"));
        assert!(toml_str.contains("mermaidDiagramCodeInserted"));
    }

    #[test]
    fn empty_file_yields_defaults() {
        let config: AppConfig = toml::from_str("").expect("parse");
        assert_eq!(config.engine.kind, EngineKind::Kroki);
        assert!(config.pipeline.remove_source);
        assert_eq!(config.pipeline.insertion_signal, InsertionSignalKind::Animation);
        assert!(!config.theme.prefers_dark);
        assert_eq!(config.augment.timeout_secs, 10);
    }

    #[test]
    fn config_with_rules() {
        let toml_str = r#"
[engine]
kind = "passthrough"

[pipeline]
remove_source = false
insertion_signal = "document-observer"

[[rules]]
name = "gitea-mermaid"
site = 'gitea\.example\.com'
parent = "pre.code-block"
child = "code.language-mermaid"
pattern = '(?s)(.+)'
handler = "render"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.engine.kind, EngineKind::Passthrough);
        assert!(!config.pipeline.remove_source);
        assert_eq!(
            config.pipeline.insertion_signal,
            InsertionSignalKind::DocumentObserver
        );
        assert_eq!(config.rules.len(), 1);
        assert_eq!(config.rules[0].handler, HandlerKind::Render);
        assert_eq!(config.rules[0].pattern.as_deref(), Some("(?s)(.+)"));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_config_from(Path::new("/nonexistent/diagramlens.toml")).unwrap_err();
        assert!(matches!(err, DiagramLensError::Io { .. }));
    }
}
