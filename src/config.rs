// ABOUTME: User configuration loaded from TOML
// Every section has defaults, so a missing file or missing keys are fine

use crate::input::KeyBindings;
use crate::pty::TerminalSize;
use crate::session::{default_shell, MuxSettings, SessionCommand, DEFAULT_HISTORY_BUDGET};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuxConfig {
    pub command: CommandConfig,
    pub shell: ShellConfig,
    /// Per-channel history budget in bytes
    pub history_budget_bytes: usize,
    /// Value of `TERM` for spawned processes
    pub term: String,
    pub shortcuts: ShortcutConfig,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            command: CommandConfig::default(),
            shell: ShellConfig::default(),
            history_budget_bytes: DEFAULT_HISTORY_BUDGET,
            term: "xterm-256color".to_string(),
            shortcuts: ShortcutConfig::default(),
        }
    }
}

/// The primary program started in every session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    pub program: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub label: String,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            program: "claude".to_string(),
            args: Vec::new(),
            env: HashMap::new(),
            label: "Agent".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub program: String,
    pub label: String,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            program: default_shell(),
            label: "Shell".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortcutConfig {
    pub return_to_menu: String,
    pub toggle_mode: String,
}

impl Default for ShortcutConfig {
    fn default() -> Self {
        Self {
            return_to_menu: "ctrl+e".to_string(),
            toggle_mode: "ctrl+t".to_string(),
        }
    }
}

impl MuxConfig {
    /// `<config dir>/agents-mux/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("agents-mux").join("config.toml"))
    }

    /// Load `path` if given, otherwise the default location. A missing
    /// default file yields defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => {
                debug!("No config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn key_bindings(&self) -> Result<KeyBindings> {
        KeyBindings::parse(&self.shortcuts.return_to_menu, &self.shortcuts.toggle_mode)
            .context("Invalid shortcut configuration")
    }

    /// Command for new sessions; `override_command` replaces program and args
    pub fn session_command(&self, override_command: &[String]) -> SessionCommand {
        let mut command = match override_command.split_first() {
            Some((program, args)) => SessionCommand::new(program.clone()).with_args(args.iter().cloned()),
            None => SessionCommand::new(self.command.program.clone()).with_args(self.command.args.iter().cloned()),
        };
        command.env.clone_from(&self.command.env);
        command
    }

    /// Manager settings for a terminal of `size`
    pub fn settings(&self, size: TerminalSize, toggle_hint: Option<String>) -> MuxSettings {
        MuxSettings {
            history_budget: self.history_budget_bytes,
            initial_size: size,
            shell: SessionCommand::new(self.shell.program.clone()),
            primary_label: self.command.label.clone(),
            secondary_label: self.shell.label.clone(),
            toggle_hint,
        }
    }
}
