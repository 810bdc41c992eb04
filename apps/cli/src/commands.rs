//! CLI command definitions, routing, and tracing setup.

use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use diagramlens_core::{RuleRegistry, open_page};
use diagramlens_render::{Theme, ThemeAttributes};
use diagramlens_shared::{AppConfig, EngineKind, init_config, load_config};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// diagramlens: live diagrams for source-hosting and wiki pages.
#[derive(Parser)]
#[command(
    name = "diagramlens",
    version,
    about = "Render diagram source blocks and augment wiki editors in host pages.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Engine override.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum EngineArg {
    Kroki,
    Passthrough,
}

impl From<EngineArg> for EngineKind {
    fn from(arg: EngineArg) -> Self {
        match arg {
            EngineArg::Kroki => EngineKind::Kroki,
            EngineArg::Passthrough => EngineKind::Passthrough,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Load a saved page, render its diagrams, and print the result.
    Render {
        /// HTML file to load (`-` for stdin).
        input: String,

        /// URL the page was loaded from; selects the rules.
        #[arg(short, long)]
        url: String,

        /// Write the page here instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Treat the environment as preferring a dark color scheme.
        #[arg(long)]
        prefers_dark: bool,

        /// Keep rendered source blocks in the page.
        #[arg(long)]
        keep_source: bool,

        /// Diagram engine (overrides config).
        #[arg(long)]
        engine: Option<EngineArg>,
    },

    /// List the rules that apply to a page URL.
    Rules {
        /// Page URL.
        url: String,

        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Resolve the diagram theme for a set of page attributes.
    Theme {
        /// `data-color-mode` value.
        #[arg(long, default_value = "")]
        mode: String,

        /// `data-dark-theme` value.
        #[arg(long, default_value = "")]
        dark_theme: String,

        /// `data-light-theme` value.
        #[arg(long, default_value = "")]
        light_theme: String,

        #[arg(long)]
        prefers_dark: bool,
    },

    /// Manage configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so the rendered
/// page can be piped from stdout.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "diagramlens=info",
        1 => "diagramlens=debug",
        _ => "diagramlens=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Render {
            input,
            url,
            out,
            prefers_dark,
            keep_source,
            engine,
        } => {
            let mut config = load_config()?;
            if prefers_dark {
                config.theme.prefers_dark = true;
            }
            if keep_source {
                config.pipeline.remove_source = false;
            }
            if let Some(engine) = engine {
                config.engine.kind = engine.into();
            }
            cmd_render(&config, &input, &url, out.as_deref()).await
        }
        Command::Rules { url, json } => cmd_rules(&url, json),
        Command::Theme {
            mode,
            dark_theme,
            light_theme,
            prefers_dark,
        } => cmd_theme(
            ThemeAttributes {
                color_mode: mode,
                dark_theme,
                light_theme,
            },
            prefers_dark,
        ),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn read_input(input: &str) -> Result<String> {
    if input == "-" {
        let mut html = String::new();
        std::io::stdin()
            .read_to_string(&mut html)
            .wrap_err("failed to read page from stdin")?;
        Ok(html)
    } else {
        std::fs::read_to_string(input).wrap_err_with(|| format!("failed to read {input}"))
    }
}

async fn cmd_render(
    config: &AppConfig,
    input: &str,
    url: &str,
    out: Option<&std::path::Path>,
) -> Result<()> {
    let html = read_input(input)?;

    let mut runtime = open_page(config, url, &html)?;
    runtime.load();
    // A browser starts the insertion animation on every candidate at first paint.
    runtime.paint();
    runtime.settle().await;

    let page = runtime.into_document().to_html();
    match out {
        Some(path) => {
            std::fs::write(path, page).wrap_err_with(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "page written");
        }
        None => println!("{page}"),
    }
    Ok(())
}

fn cmd_rules(url: &str, json: bool) -> Result<()> {
    let config = load_config()?;
    let registry = RuleRegistry::for_page(url, &config.rules)?;

    if json {
        let rules: Vec<serde_json::Value> = registry
            .iter()
            .map(|rule| {
                serde_json::json!({
                    "name": rule.name,
                    "parent": rule.parent_selector.as_str(),
                    "child": rule.child_selector.as_str(),
                    "pattern": rule.extraction_pattern.as_ref().map(|re| re.as_str()),
                    "handler": rule.handler.name(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rules)?);
        return Ok(());
    }

    if registry.is_empty() {
        println!("No rules apply to {url}");
        return Ok(());
    }
    for rule in &registry {
        println!(
            "{:<20} {:<15} parent={} child={}",
            rule.name,
            rule.handler.name(),
            rule.parent_selector,
            rule.child_selector,
        );
    }
    Ok(())
}

fn cmd_theme(attrs: ThemeAttributes, prefers_dark: bool) -> Result<()> {
    let theme = Theme::resolve(&attrs, prefers_dark);
    println!("theme: {}", theme.name());
    if !theme.preamble().is_empty() {
        print!("preamble: {}", theme.preamble());
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
