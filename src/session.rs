// =============================================================================
// Session State — typed commands for cross-panel signalling
// =============================================================================
//
// Panels never poke each other directly. They submit an `AppCommand`, the
// session store applies it, and every panel renders from the resulting
// `SessionState`.
// =============================================================================

use serde::{Deserialize, Serialize};
use tracing::info;

pub const WELCOME_TOAST: &str = "Welcome back!";
pub const LOGOUT_TOAST: &str = "You have been logged out.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum AppCommand {
    OpenChat,
    OpenContactSupport,
    OpenResetPassword,
    CloseModals,
    LoginSucceeded,
    Logout,
    DismissToast,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub authenticated: bool,
    pub chat_open: bool,
    pub contact_support_open: bool,
    pub reset_password_open: bool,
    pub toast: Option<String>,
}

impl SessionState {
    pub fn apply(&mut self, command: AppCommand) {
        match command {
            AppCommand::OpenChat => self.chat_open = true,
            AppCommand::OpenContactSupport => self.contact_support_open = true,
            AppCommand::OpenResetPassword => self.reset_password_open = true,
            AppCommand::CloseModals => {
                self.chat_open = false;
                self.contact_support_open = false;
                self.reset_password_open = false;
            }
            AppCommand::LoginSucceeded => {
                self.authenticated = true;
                self.toast = Some(WELCOME_TOAST.to_string());
            }
            AppCommand::Logout => {
                *self = Self {
                    toast: Some(LOGOUT_TOAST.to_string()),
                    ..Self::default()
                };
            }
            AppCommand::DismissToast => self.toast = None,
        }
        info!(?command, authenticated = self.authenticated, "session command applied");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_then_logout() {
        let mut s = SessionState::default();
        s.apply(AppCommand::LoginSucceeded);
        assert!(s.authenticated);
        assert_eq!(s.toast.as_deref(), Some(WELCOME_TOAST));

        s.apply(AppCommand::OpenChat);
        s.apply(AppCommand::Logout);
        assert!(!s.authenticated);
        assert!(!s.chat_open);
        assert_eq!(s.toast.as_deref(), Some(LOGOUT_TOAST));
    }

    #[test]
    fn modal_commands() {
        let mut s = SessionState::default();
        s.apply(AppCommand::OpenContactSupport);
        s.apply(AppCommand::OpenResetPassword);
        assert!(s.contact_support_open && s.reset_password_open);
        s.apply(AppCommand::CloseModals);
        assert_eq!(s, SessionState::default());
    }

    #[test]
    fn command_wire_format() {
        let cmd: AppCommand = serde_json::from_str(r#"{"command":"open_chat"}"#).unwrap();
        assert_eq!(cmd, AppCommand::OpenChat);
        let mut s = SessionState::default();
        s.apply(AppCommand::LoginSucceeded);
        s.apply(AppCommand::DismissToast);
        assert!(s.toast.is_none());
    }
}
