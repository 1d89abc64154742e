// =============================================================================
// vt-greeter — Form State
//
// The three-field login form (session selector, login, password) and the
// focus state machine that routes key events into whichever field is
// active. Global keys (shutdown, reboot, Ctrl+C) are checked ahead of
// field-specific routing by the main loop, not here.
// =============================================================================

use crate::config::Config;
use crate::credential::{CredentialBuffer, Direction};
use crate::desktop::DesktopCatalog;
use crate::error::GreeterError;

/// Which field currently receives input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Session = 0,
    Login = 1,
    Password = 2,
}

impl Focus {
    fn from_index(i: u8) -> Self {
        match i {
            0 => Self::Session,
            1 => Self::Login,
            _ => Self::Password,
        }
    }

    fn index(self) -> u8 {
        self as u8
    }
}

/// A key the form understands, already translated from whatever terminal
/// backend produced it (see `crate::ui`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKey {
    Up,
    Down,
    Left,
    Right,
    Enter,
    Backspace,
    Delete,
    Char(u8),
}

/// What happened after routing one key through the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormOutcome {
    /// Nothing externally observable; redraw is still warranted.
    Continue,
    /// Enter was pressed while focus was on the password field.
    Submit,
}

pub struct FormState {
    pub session: DesktopCatalog,
    pub login: CredentialBuffer,
    pub password: CredentialBuffer,
    pub focus: Focus,
}

impl FormState {
    /// Builds the form's buffers. The second element of the success tuple
    /// is a non-fatal `MlockErr` warning from the password buffer's
    /// construction, if mlock failed — `FormState::new` runs before the
    /// main loop's `Diagnostics` slot exists, so it can't record the
    /// warning itself; the caller does once that slot is available.
    pub fn new(
        session: DesktopCatalog,
        config: &Config,
        visible_len: usize,
    ) -> Result<(Self, Option<GreeterError>), GreeterError> {
        let (login, _) = CredentialBuffer::new(config.max_login_len, visible_len, false)?;
        let (password, mlock_warning) = CredentialBuffer::new(config.max_password_len, visible_len, true)?;
        Ok((
            Self {
                session,
                login,
                password,
                // Assumes the previous session's user/session choice was
                // restored via the save file, so the cursor starts where
                // the user most likely wants to type next.
                focus: Focus::Password,
            },
            mlock_warning,
        ))
    }

    /// Routes one field-scoped key through the currently focused field.
    /// Focus-changing keys (Up/Down) are handled here directly; Enter is
    /// handled as "advance focus" unless focus is already `Password`, in
    /// which case it signals submission.
    pub fn handle_key(&mut self, key: FormKey) -> FormOutcome {
        match key {
            FormKey::Up => {
                let idx = self.focus.index();
                if idx > 0 {
                    self.focus = Focus::from_index(idx - 1);
                }
                FormOutcome::Continue
            }
            FormKey::Down => {
                let idx = self.focus.index();
                if idx < 2 {
                    self.focus = Focus::from_index(idx + 1);
                }
                FormOutcome::Continue
            }
            FormKey::Enter => {
                if self.focus == Focus::Password {
                    FormOutcome::Submit
                } else {
                    let idx = self.focus.index();
                    self.focus = Focus::from_index(idx + 1);
                    FormOutcome::Continue
                }
            }
            FormKey::Left => {
                self.route_direction(Direction::Left);
                FormOutcome::Continue
            }
            FormKey::Right => {
                self.route_direction(Direction::Right);
                FormOutcome::Continue
            }
            FormKey::Backspace => {
                self.active_buffer_mut().map(CredentialBuffer::backspace);
                FormOutcome::Continue
            }
            FormKey::Delete => {
                self.active_buffer_mut().map(CredentialBuffer::delete);
                FormOutcome::Continue
            }
            FormKey::Char(c) => {
                self.active_buffer_mut().map(|b| b.write(c));
                FormOutcome::Continue
            }
        }
    }

    fn route_direction(&mut self, dir: Direction) {
        match self.focus {
            Focus::Session => self.session.move_cur(dir),
            Focus::Login => self.login.move_cursor(dir),
            Focus::Password => self.password.move_cursor(dir),
        }
    }

    fn active_buffer_mut(&mut self) -> Option<&mut CredentialBuffer> {
        match self.focus {
            Focus::Session => None,
            Focus::Login => Some(&mut self.login),
            Focus::Password => Some(&mut self.password),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desktop::DesktopCatalog;
    use std::path::Path;

    fn blank_form() -> FormState {
        let dc = DesktopCatalog::scan(Path::new("/none"), Path::new("/none"), ".xinitrc", true);
        FormState::new(dc, &Config::default(), 32).unwrap().0
    }

    #[test]
    fn initial_focus_is_password() {
        let form = blank_form();
        assert_eq!(form.focus, Focus::Password);
    }

    #[test]
    fn focus_cannot_go_below_session_or_above_password() {
        let mut form = blank_form();
        form.focus = Focus::Session;
        form.handle_key(FormKey::Up);
        assert_eq!(form.focus, Focus::Session);

        form.focus = Focus::Password;
        form.handle_key(FormKey::Down);
        assert_eq!(form.focus, Focus::Password);
    }

    #[test]
    fn enter_on_password_submits_but_elsewhere_advances() {
        let mut form = blank_form();
        form.focus = Focus::Session;
        assert_eq!(form.handle_key(FormKey::Enter), FormOutcome::Continue);
        assert_eq!(form.focus, Focus::Login);
        assert_eq!(form.handle_key(FormKey::Enter), FormOutcome::Continue);
        assert_eq!(form.focus, Focus::Password);
        assert_eq!(form.handle_key(FormKey::Enter), FormOutcome::Submit);
    }

    #[test]
    fn fields_preserve_contents_across_focus_changes() {
        let mut form = blank_form();
        form.focus = Focus::Login;
        form.handle_key(FormKey::Char(b'a'));
        form.handle_key(FormKey::Char(b'l'));
        form.focus = Focus::Password;
        form.handle_key(FormKey::Char(b'x'));
        form.focus = Focus::Login;
        assert_eq!(form.login.as_str(), "al");
        form.focus = Focus::Password;
        assert_eq!(form.password.as_str(), "x");
    }

    #[test]
    fn left_right_on_session_moves_catalog_cursor() {
        let mut form = blank_form();
        form.focus = Focus::Session;
        assert_eq!(form.session.cur(), 0);
        form.handle_key(FormKey::Right);
        assert_eq!(form.session.cur(), 1);
        form.handle_key(FormKey::Left);
        assert_eq!(form.session.cur(), 0);
    }
}
