use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::engine::EngineConfig;

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "screen-verifier",
    version,
    about = "Runs UI automation scripts against a documented app model"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: screen-verifier.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run scripts on a device through the configured driver
    Run {
        /// API catalog JSON
        #[arg(long)]
        catalog: String,

        /// Script file (text, YAML or JSON) or a directory of scripts
        #[arg(long)]
        script: String,

        /// Output format: console, json
        #[arg(long)]
        format: Option<String>,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<String>,

        /// Execution log path (JSON lines)
        #[arg(long)]
        trace: Option<String>,

        /// Driver command, overriding the config file
        #[arg(long)]
        driver: Option<String>,
    },

    /// Compile a script and print its structured form as YAML
    Compile {
        #[arg(long)]
        script: String,

        #[arg(short, long)]
        output: Option<String>,
    },

    /// Load a catalog and report its screens and elements
    Check {
        #[arg(long)]
        catalog: String,
    },

    /// Name the catalog screen an observation belongs to
    Identify {
        #[arg(long)]
        catalog: String,

        /// Observation: raw JSON screen or tagged view markup
        #[arg(long)]
        observation: String,
    },
}

// ============================================================================
// Config File Model (optional YAML)
// ============================================================================

/// Optional YAML config file: `screen-verifier.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(default)]
    pub trace: TraceConfig,
    #[serde(default)]
    pub run: RunConfig,
}

/// Device bridge subprocess.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriverConfig {
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceConfig {
    /// Execution log destination; no log is written when unset
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_console")]
    pub format: String,

    pub output: Option<String>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            format: "console".to_string(),
            output: None,
        }
    }
}

fn default_console() -> String {
    "console".to_string()
}

// ============================================================================
// Config File Loading
// ============================================================================

/// Load config from a YAML file. Returns defaults if file is missing or malformed.
pub fn load_config(path: Option<&str>) -> AppConfig {
    let config_path = path.unwrap_or("screen-verifier.yaml");
    match std::fs::read_to_string(config_path) {
        Ok(content) => match serde_yaml::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = config_path, error = %e, "ignoring malformed config");
                AppConfig::default()
            }
        },
        Err(_) => AppConfig::default(),
    }
}

/// Map `-v` occurrences to a default log filter.
pub fn default_log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
