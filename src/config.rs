//! Configuration System
//!
//! The recognized options are the only knobs that affect translation; every
//! configuration-keyed branch in the translator is reachable by flipping
//! exactly these fields. Loading is hierarchical:
//! - built-in defaults
//! - `deltalog.toml` (working directory)
//! - environment variables (`DELTALOG_*` prefix)
//!
//! ## Example
//!
//! ```toml
//! # deltalog.toml
//! fact-dir = "facts"
//! output-dir = "out"
//! incremental = true
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! DELTALOG_INCREMENTAL=true
//! DELTALOG_OUTPUT_DIR=/tmp/out
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Provenance instrumentation mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProvenanceMode {
    #[default]
    Off,
    On,
    SubtreeHeights,
}

impl ProvenanceMode {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, ProvenanceMode::Off)
    }
}

/// Translator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory input fact files are resolved against.
    #[serde(rename = "fact-dir", default = "default_fact_dir")]
    pub fact_dir: String,

    /// Directory output files are resolved against; `-` selects stdout.
    #[serde(rename = "output-dir", default = "default_output_dir")]
    pub output_dir: String,

    /// Name of a communication engine coordinating multiple processes.
    /// When set, intermediate relations are exchanged through files in the
    /// output directory.
    #[serde(default)]
    pub engine: Option<String>,

    /// Provenance instrumentation mode.
    #[serde(default)]
    pub provenance: ProvenanceMode,

    /// Incremental view maintenance mode.
    #[serde(default)]
    pub incremental: bool,

    /// Emit profiling timers and frequency annotations.
    #[serde(default)]
    pub profile: bool,

    /// Compile the IR ahead of time (disables interpreter-only paths).
    #[serde(default)]
    pub compile: bool,

    /// Path for a standalone Datalog program executable.
    #[serde(rename = "dl-program", default)]
    pub dl_program: Option<String>,

    /// Directory for generated sources.
    #[serde(default)]
    pub generate: Option<String>,

    /// Path of the HTML debug report; empty disables reporting.
    #[serde(rename = "debug-report", default)]
    pub debug_report: Option<String>,
}

fn default_fact_dir() -> String {
    ".".to_string()
}

fn default_output_dir() -> String {
    ".".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            fact_dir: default_fact_dir(),
            output_dir: default_output_dir(),
            engine: None,
            provenance: ProvenanceMode::Off,
            incremental: false,
            profile: false,
            compile: false,
            dl_program: None,
            generate: None,
            debug_report: None,
        }
    }
}

impl Config {
    /// Load configuration from `deltalog.toml` and the environment,
    /// starting from defaults.
    pub fn load() -> Result<Self> {
        let config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("deltalog.toml"))
            // Option names are kebab-case; environment keys use
            // underscores (DELTALOG_FACT_DIR -> fact-dir).
            .merge(Env::prefixed("DELTALOG_").map(|key| key.as_str().replace('_', "-").into()))
            .extract()?;
        Ok(config)
    }

    /// Incremental mode with everything else defaulted. Test convenience.
    pub fn incremental() -> Self {
        Config {
            incremental: true,
            ..Config::default()
        }
    }

    /// True when the interpreter (not a compiled binary) will run the IR.
    /// Some provenance instrumentation only applies there.
    pub fn interpreted(&self) -> bool {
        !self.compile && self.dl_program.is_none() && self.generate.is_none()
    }

    /// True when the debug report collaborator should receive sections.
    pub fn debug_report_enabled(&self) -> bool {
        self.debug_report.as_deref().is_some_and(|path| !path.is_empty())
    }
}
