// ABOUTME: Reserved key bindings recognized while a session has the terminal
// Maps config strings like "ctrl+e" to the raw bytes a terminal in raw mode delivers

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Control actions intercepted before input reaches a process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShortcutAction {
    ReturnToMenu,
    ToggleMode,
}

impl ShortcutAction {
    pub const ALL: [Self; 2] = [Self::ReturnToMenu, Self::ToggleMode];
}

/// Recognizes reserved actions in raw terminal input
pub trait ShortcutResolver: Send + Sync {
    fn matches(&self, action: ShortcutAction, input: &[u8]) -> bool {
        self.code_for(action).is_some_and(|code| code == input)
    }

    /// Raw bytes bound to `action`, if it is bound at all
    fn code_for(&self, action: ShortcutAction) -> Option<&[u8]>;

    fn display_label(&self, action: ShortcutAction) -> String;

    /// First action bound to exactly `input`
    fn resolve(&self, input: &[u8]) -> Option<ShortcutAction> {
        ShortcutAction::ALL
            .into_iter()
            .find(|action| self.matches(*action, input))
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyBindingError {
    #[error("Empty key binding")]
    Empty,
    #[error("Unsupported key binding: {0}")]
    Unsupported(String),
}

/// A single parsed key: its raw code and how to show it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBinding {
    code: Vec<u8>,
    label: String,
}

impl KeyBinding {
    /// Parse `ctrl+<letter>`, `ctrl+[`, `ctrl+]`, `ctrl+\`, `esc` or a single printable character
    pub fn parse(spec: &str) -> Result<Self, KeyBindingError> {
        let normalized = spec.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(KeyBindingError::Empty);
        }

        if normalized == "esc" || normalized == "escape" {
            return Ok(Self {
                code: vec![0x1b],
                label: "Esc".to_string(),
            });
        }

        if let Some(key) = normalized
            .strip_prefix("ctrl+")
            .or_else(|| normalized.strip_prefix("ctrl-"))
            .or_else(|| normalized.strip_prefix("c-"))
        {
            let mut chars = key.chars();
            let (Some(c), None) = (chars.next(), chars.next()) else {
                return Err(KeyBindingError::Unsupported(spec.to_string()));
            };
            let code = match c {
                'a'..='z' => c as u8 - b'a' + 1,
                '[' => 0x1b,
                '\\' => 0x1c,
                ']' => 0x1d,
                '^' => 0x1e,
                '_' => 0x1f,
                _ => return Err(KeyBindingError::Unsupported(spec.to_string())),
            };
            return Ok(Self {
                code: vec![code],
                label: format!("Ctrl+{}", c.to_ascii_uppercase()),
            });
        }

        let mut chars = spec.trim().chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_graphic() => Ok(Self {
                code: vec![c as u8],
                label: c.to_string(),
            }),
            _ => Err(KeyBindingError::Unsupported(spec.to_string())),
        }
    }

    pub fn code(&self) -> &[u8] {
        &self.code
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// Bindings for both reserved actions; either may be left unbound
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBindings {
    return_to_menu: Option<KeyBinding>,
    toggle_mode: Option<KeyBinding>,
}

impl KeyBindings {
    pub fn new(return_to_menu: Option<KeyBinding>, toggle_mode: Option<KeyBinding>) -> Self {
        Self {
            return_to_menu,
            toggle_mode,
        }
    }

    pub fn parse(return_to_menu: &str, toggle_mode: &str) -> Result<Self, KeyBindingError> {
        let return_to_menu = KeyBinding::parse(return_to_menu)?;
        let toggle_mode = KeyBinding::parse(toggle_mode)?;
        if return_to_menu.code == toggle_mode.code {
            return Err(KeyBindingError::Unsupported(format!(
                "{} is bound to both actions",
                toggle_mode.label
            )));
        }
        Ok(Self::new(Some(return_to_menu), Some(toggle_mode)))
    }

    fn binding(&self, action: ShortcutAction) -> Option<&KeyBinding> {
        match action {
            ShortcutAction::ReturnToMenu => self.return_to_menu.as_ref(),
            ShortcutAction::ToggleMode => self.toggle_mode.as_ref(),
        }
    }
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self::new(
            Some(KeyBinding {
                code: vec![0x05],
                label: "Ctrl+E".to_string(),
            }),
            Some(KeyBinding {
                code: vec![0x14],
                label: "Ctrl+T".to_string(),
            }),
        )
    }
}

impl ShortcutResolver for KeyBindings {
    fn code_for(&self, action: ShortcutAction) -> Option<&[u8]> {
        self.binding(action).map(KeyBinding::code)
    }

    fn display_label(&self, action: ShortcutAction) -> String {
        self.binding(action)
            .map_or_else(|| "unbound".to_string(), |binding| binding.label.clone())
    }
}
