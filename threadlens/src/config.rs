//! User configuration and command-line overrides.
//!
//! Settings come from `$XDG_CONFIG_HOME/threadlens/config.toml` (falling back to
//! `~/.config/threadlens/config.toml`). A missing or unparsable file is never
//! fatal: defaults are used and the problem is logged once logging is up.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;
use threadlens_core::db::IN_MEMORY;

/// Command-line flags. Every flag overrides the matching config key.
#[derive(Debug, Parser)]
#[command(name = "threadlens", version, about = "Review a branch next to the conversation that wrote it")]
pub struct Cli {
    /// Repository to open.
    #[arg(long, default_value = ".")]
    pub repo: PathBuf,

    /// Base revision the branch is compared against.
    #[arg(long)]
    pub base: Option<String>,

    /// Mapping reference to use instead of discovering one.
    #[arg(long)]
    pub mapping: Option<String>,

    /// Fetch proxy origin used when direct retrieval is refused.
    #[arg(long)]
    pub proxy: Option<String>,
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub theme: String,
    pub base: String,
    /// Reference store location. The default `":memory:"` keeps references
    /// for this session only; a file path persists them across runs.
    pub cache_path: String,
    pub proxy: Option<String>,
    pub log_filter: String,
    #[serde(skip)]
    pub mapping: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            theme: "catppuccin-mocha".to_owned(),
            base: "main".to_owned(),
            cache_path: IN_MEMORY.to_owned(),
            proxy: None,
            log_filter: "threadlens=info,threadlens_core=info".to_owned(),
            mapping: None,
        }
    }
}

impl Config {
    /// Applies command-line overrides on top of the file values.
    pub fn with_cli(mut self, cli: &Cli) -> Self {
        if let Some(base) = &cli.base {
            self.base = base.clone();
        }
        if let Some(proxy) = &cli.proxy {
            self.proxy = Some(proxy.clone());
        }
        self.mapping = cli.mapping.clone();
        self
    }
}

/// Returns the path to the threadlens config file.
pub fn config_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .ok()
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        })
        .unwrap_or_else(|| PathBuf::from(".config"));
    base.join("threadlens").join("config.toml")
}

/// Reads the config at `path`.
///
/// Returns the defaults plus a warning to log when the file is unreadable or
/// malformed. A file that does not exist yields no warning.
pub fn load(path: &Path) -> (Config, Option<String>) {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return (Config::default(), None),
        Err(err) => {
            return (
                Config::default(),
                Some(format!("cannot read {}: {err}", path.display())),
            )
        }
    };
    match toml::from_str::<Config>(&raw) {
        Ok(config) => (config, None),
        Err(err) => (
            Config::default(),
            Some(format!("config parse error in {}: {err}", path.display())),
        ),
    }
}
