// ABOUTME: Routes raw terminal input for the attached session
// Reserved shortcuts are intercepted; everything else goes verbatim to the focused process

use crate::error::MuxError;
use crate::input::shortcuts::{ShortcutAction, ShortcutResolver};
use crate::session::{Channel, Session, SessionManager};
use std::sync::Arc;
use tracing::debug;

/// What happened to one read of raw input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    /// The user asked to leave the session; the caller deactivates it
    ReturnToMenu,
    /// Focus moved to this channel
    ModeToggled(Channel),
    /// Bytes were handed to this channel's process
    Forwarded(Channel),
    /// The focused channel had no live process to take the bytes
    Dropped,
}

pub struct InputRouter {
    resolver: Arc<dyn ShortcutResolver>,
}

impl InputRouter {
    pub fn new(resolver: Arc<dyn ShortcutResolver>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &dyn ShortcutResolver {
        self.resolver.as_ref()
    }

    /// Never changes whether the session is active; that stays with the manager's caller.
    pub fn route(
        &self,
        manager: &SessionManager,
        session: &Arc<Session>,
        input: &[u8],
    ) -> Result<InputAction, MuxError> {
        if input.is_empty() {
            return Ok(InputAction::Dropped);
        }

        match self.resolver.resolve(input) {
            Some(ShortcutAction::ReturnToMenu) => {
                debug!("Return-to-menu requested from session {}", session.id());
                Ok(InputAction::ReturnToMenu)
            }
            Some(ShortcutAction::ToggleMode) => {
                let channel = manager.toggle_mode(session)?;
                Ok(InputAction::ModeToggled(channel))
            }
            None => {
                let mode = session.mode();
                if session.write(input) {
                    Ok(InputAction::Forwarded(mode))
                } else {
                    Ok(InputAction::Dropped)
                }
            }
        }
    }
}

impl std::fmt::Debug for InputRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputRouter")
            .field("return_to_menu", &self.resolver.display_label(ShortcutAction::ReturnToMenu))
            .field("toggle_mode", &self.resolver.display_label(ShortcutAction::ToggleMode))
            .finish()
    }
}
