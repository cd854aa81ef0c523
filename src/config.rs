use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::join::JoinConfig;

/// Main configuration structure that can be loaded from CLI or a config file
///
/// Reads a list of FLV files (with optional in-point and out-point, in
/// seconds) and joins them together into one larger FLV file.
///
/// Example configuration file content
/// # flvjoin configuration
/// output = "joined.flv"
/// framerate = 25.0
/// audio_bitrate = 64000
/// no_meta = false
/// quiet = false
/// playlist = "inputs.txt"   # Optional: default is stdin
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(version, about, long_about = None)]
#[serde(default)]
pub struct Config {
    /// Output file (- for stdout)
    #[arg(short, long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    /// Video frame rate in frames per second
    #[arg(short, long, default_value_t = 10.0)]
    #[serde(default = "default_framerate")]
    pub framerate: f64,

    /// Audio bitrate in bits per second
    #[arg(short = 'b', long, default_value_t = 32000)]
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: u32,

    /// Don't write metadata to output file
    #[arg(short, long)]
    pub no_meta: bool,

    /// Don't display progress information
    #[arg(short, long)]
    pub quiet: bool,

    /// Read the input list from this file instead of stdin
    #[arg(short = 'i', long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playlist: Option<String>,

    /// Replace the output file if it already exists
    #[arg(long)]
    pub force: bool,

    /// Configuration file path
    #[arg(short, long)]
    #[serde(skip)]
    pub config: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: None,
            framerate: default_framerate(),
            audio_bitrate: default_audio_bitrate(),
            no_meta: false,
            quiet: false,
            playlist: None,
            force: false,
            config: None,
        }
    }
}

impl Config {
    /// Load configuration from CLI args, optionally merging with a config file
    pub fn load() -> Result<Self> {
        // First parse CLI args
        let mut config = Config::parse();

        // If a config file is specified, load it and merge
        if let Some(config_path) = &config.config {
            let file_config = Self::from_file(Path::new(config_path))?;
            config = config.merge_with_file(file_config);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Merge with file config, CLI args take precedence
    fn merge_with_file(mut self, file_config: Config) -> Self {
        // If CLI value is default, use file value
        if self.framerate == default_framerate() {
            self.framerate = file_config.framerate;
        }
        if self.audio_bitrate == default_audio_bitrate() {
            self.audio_bitrate = file_config.audio_bitrate;
        }

        // Flags can only be switched on
        self.no_meta |= file_config.no_meta;
        self.quiet |= file_config.quiet;
        self.force |= file_config.force;

        // For Option fields, CLI takes precedence if Some
        if self.output.is_none() {
            self.output = file_config.output;
        }
        if self.playlist.is_none() {
            self.playlist = file_config.playlist;
        }

        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        match self.output.as_deref() {
            None | Some("") => {
                return Err(anyhow::anyhow!(
                    "Output file must be specified with the -o option (use - for stdout)"
                ));
            }
            Some(_) => {}
        }

        if !self.framerate.is_finite() || self.framerate <= 0.0 {
            return Err(anyhow::anyhow!(
                "Frame rate must be a positive number, got {}",
                self.framerate
            ));
        }

        if self.audio_bitrate == 0 {
            return Err(anyhow::anyhow!("Audio bitrate must be greater than zero"));
        }

        Ok(())
    }

    /// Output path, `-` meaning stdout.
    pub fn output(&self) -> Result<&str> {
        self.output
            .as_deref()
            .filter(|o| !o.is_empty())
            .ok_or_else(|| anyhow::anyhow!("Output file is not set"))
    }

    pub fn writes_to_stdout(&self) -> bool {
        self.output.as_deref() == Some("-")
    }

    /// Milliseconds between video frames, rounded to the nearest integer.
    pub fn frame_interval_ms(&self) -> u32 {
        (1000.0 / self.framerate + 0.5) as u32
    }

    /// Settings for the join engine.
    pub fn join_config(&self) -> JoinConfig {
        JoinConfig {
            frame_interval_ms: self.frame_interval_ms(),
            audio_bitrate: self.audio_bitrate,
            write_metadata: !self.no_meta,
        }
    }
}

// Default value functions
fn default_framerate() -> f64 {
    10.0
}

fn default_audio_bitrate() -> u32 {
    32000
}
