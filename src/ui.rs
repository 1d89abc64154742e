// =============================================================================
// vt-greeter — Terminal UI
//
// A thin ratatui/crossterm adapter: renders the three-field form, the
// hostname banner, lock indicators, and the diagnostic line into a single
// centered block, and translates crossterm key events into `FormKey`. This
// is not a general widget toolkit — there is exactly one screen.
// =============================================================================

use std::io::Stdout;
use std::time::Duration;

use crossterm::event::{self, Event as CrosstermEvent, KeyCode, KeyModifiers};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Alignment, Constraint, Direction as LayoutDirection, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Terminal;

use crate::config::Config;
use crate::error::{Diagnostics, GreeterError};
use crate::form::{Focus, FormKey, FormState};
use crate::locale::Locale;
use crate::tty::LockState;

/// Resolves the machine's hostname via `gethostname(2)`. Called once, by
/// `Screen::init`, and cached in `Screen` itself rather than behind a
/// process-wide `static` — the value cannot change for the lifetime of the
/// greeter, but it belongs to the UI layer's state, not to a global.
fn resolve_hostname() -> Result<String, GreeterError> {
    let mut buf = vec![0u8; 256];
    let ret = unsafe { libc::gethostname(buf.as_mut_ptr() as *mut libc::c_char, buf.len()) };
    if ret != 0 {
        return Err(GreeterError::HostnameErr);
    }
    let nul = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..nul]).into_owned())
}

/// Non-field keys the main loop handles before routing reaches the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalKey {
    Quit,
    Shutdown,
    Reboot,
}

/// The result of reading one terminal event.
pub enum InputEvent {
    Global(GlobalKey),
    Form(FormKey),
    Resize,
    Tick,
}

/// Owns the alternate-screen terminal and restores the original screen on
/// drop, mirroring the teacher's "never leave the tty in a weird state"
/// discipline.
pub struct Screen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    hostname: String,
}

impl Screen {
    /// Initializes the terminal and resolves the hostname banner. A failed
    /// `gethostname(2)` is non-fatal — the screen still comes up with a
    /// `"localhost"` placeholder — so it is returned as a warning alongside
    /// the screen rather than failing construction; the caller records it
    /// once a `Diagnostics` slot exists.
    pub fn init() -> Result<(Self, Option<GreeterError>), GreeterError> {
        crossterm::terminal::enable_raw_mode().map_err(|_| GreeterError::ConsoleDev)?;
        let mut stdout = std::io::stdout();
        stdout.execute(EnterAlternateScreen).map_err(|_| GreeterError::ConsoleDev)?;
        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend).map_err(|_| GreeterError::ConsoleDev)?;

        let (hostname, hostname_warning) = match resolve_hostname() {
            Ok(name) => (name, None),
            Err(err) => ("localhost".to_string(), Some(err)),
        };

        Ok((Self { terminal, hostname }, hostname_warning))
    }

    /// Blocks for up to `timeout` for the next terminal event, translating
    /// it into the form's vocabulary. Returns `Tick` if nothing arrived in
    /// time, so the caller can still re-poll lock-key state on a cadence.
    pub fn poll(&mut self, timeout: Duration) -> Result<InputEvent, GreeterError> {
        if !event::poll(timeout).map_err(|_| GreeterError::ConsoleDev)? {
            return Ok(InputEvent::Tick);
        }

        match event::read().map_err(|_| GreeterError::ConsoleDev)? {
            CrosstermEvent::Resize(_, _) => Ok(InputEvent::Resize),
            CrosstermEvent::Key(key) => Ok(translate_key(key)),
            _ => Ok(InputEvent::Tick),
        }
    }

    /// Leaves raw mode and the alternate screen without tearing down the
    /// underlying `Terminal`, so a session can own the tty for a while and
    /// `resume` can cheaply put the form back up afterward.
    pub fn suspend(&mut self) -> Result<(), GreeterError> {
        crossterm::terminal::disable_raw_mode().map_err(|_| GreeterError::ConsoleDev)?;
        self.terminal
            .backend_mut()
            .execute(LeaveAlternateScreen)
            .map_err(|_| GreeterError::ConsoleDev)?;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), GreeterError> {
        crossterm::terminal::enable_raw_mode().map_err(|_| GreeterError::ConsoleDev)?;
        self.terminal
            .backend_mut()
            .execute(EnterAlternateScreen)
            .map_err(|_| GreeterError::ConsoleDev)?;
        self.terminal.clear().map_err(|_| GreeterError::ConsoleDev)?;
        Ok(())
    }

    pub fn draw(
        &mut self,
        config: &Config,
        locale: &Locale,
        form: &FormState,
        diagnostics: &Diagnostics,
        locks: Option<LockState>,
    ) -> Result<(), GreeterError> {
        let hostname = self.hostname.as_str();
        self.terminal
            .draw(|frame| render(frame.size(), frame, config, locale, form, diagnostics, locks, hostname))
            .map_err(|_| GreeterError::ConsoleDev)?;
        Ok(())
    }
}

impl Drop for Screen {
    fn drop(&mut self) {
        let _ = crossterm::terminal::disable_raw_mode();
        let _ = self.terminal.backend_mut().execute(LeaveAlternateScreen);
    }
}

fn translate_key(key: crossterm::event::KeyEvent) -> InputEvent {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return InputEvent::Global(GlobalKey::Quit);
    }
    match key.code {
        KeyCode::F(1) => InputEvent::Global(GlobalKey::Shutdown),
        KeyCode::F(2) => InputEvent::Global(GlobalKey::Reboot),
        KeyCode::Up => InputEvent::Form(FormKey::Up),
        KeyCode::Down => InputEvent::Form(FormKey::Down),
        KeyCode::Left => InputEvent::Form(FormKey::Left),
        KeyCode::Right => InputEvent::Form(FormKey::Right),
        KeyCode::Enter => InputEvent::Form(FormKey::Enter),
        KeyCode::Backspace => InputEvent::Form(FormKey::Backspace),
        KeyCode::Delete => InputEvent::Form(FormKey::Delete),
        KeyCode::Char(c) if c.is_ascii() => InputEvent::Form(FormKey::Char(c as u8)),
        _ => InputEvent::Tick,
    }
}

fn render(
    area: Rect,
    frame: &mut ratatui::Frame<'_>,
    config: &Config,
    locale: &Locale,
    form: &FormState,
    diagnostics: &Diagnostics,
    locks: Option<LockState>,
    hostname: &str,
) {
    let _ = config;
    let chunks = Layout::default()
        .direction(LayoutDirection::Vertical)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Length(7),
            Constraint::Percentage(30),
        ])
        .split(area);

    let form_area = centered(chunks[1], 44);

    let banner = Paragraph::new(Line::from(Span::styled(
        hostname,
        Style::default().add_modifier(Modifier::BOLD),
    )))
    .alignment(Alignment::Center);
    frame.render_widget(banner, chunks[0]);

    let block = Block::default().borders(Borders::ALL).title(" vt-greeter ");
    let inner = block.inner(form_area);
    frame.render_widget(block, form_area);

    let rows = Layout::default()
        .direction(LayoutDirection::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inner);

    frame.render_widget(session_line(form, locale), rows[0]);
    frame.render_widget(field_line(locale.get("login"), form.login.as_str(), form.focus == Focus::Login), rows[1]);
    frame.render_widget(
        field_line(locale.get("password"), &"*".repeat(form.password.as_str().len()), form.focus == Focus::Password),
        rows[2],
    );
    frame.render_widget(status_line(diagnostics, locks, locale), rows[3]);

    let hint = Paragraph::new(Line::from(format!(
        "F1 {}    F2 {}",
        locale.get("shutdown"),
        locale.get("restart")
    )))
    .alignment(Alignment::Center);
    frame.render_widget(hint, chunks[2]);
}

fn session_line<'a>(form: &'a FormState, locale: &'a Locale) -> Paragraph<'a> {
    let name = form.session.current().display_name.as_str();
    let style = if form.focus == Focus::Session {
        Style::default().add_modifier(Modifier::REVERSED)
    } else {
        Style::default()
    };
    Paragraph::new(Line::from(vec![
        Span::raw(format!("{}: ", locale.get("session"))),
        Span::styled(name, style),
    ]))
}

fn field_line<'a>(label: &'a str, value: &'a str, focused: bool) -> Paragraph<'a> {
    let style = if focused {
        Style::default().add_modifier(Modifier::REVERSED)
    } else {
        Style::default()
    };
    Paragraph::new(Line::from(vec![
        Span::raw(format!("{label}: ")),
        Span::styled(value, style),
    ]))
}

fn status_line<'a>(diagnostics: &'a Diagnostics, locks: Option<LockState>, locale: &'a Locale) -> Paragraph<'a> {
    let mut spans = Vec::new();
    if let Some(message) = diagnostics.current() {
        spans.push(Span::styled(message, Style::default().add_modifier(Modifier::BOLD)));
    }
    if let Some(state) = locks {
        if state.caps_lock {
            spans.push(Span::raw(format!(" {}", locale.get("capslock"))));
        }
        if state.num_lock {
            spans.push(Span::raw(format!(" {}", locale.get("numlock"))));
        }
    }
    Paragraph::new(Line::from(spans))
}

fn centered(area: Rect, width_pct: u16) -> Rect {
    let horizontal = Layout::default()
        .direction(LayoutDirection::Horizontal)
        .constraints([
            Constraint::Percentage((100 - width_pct) / 2),
            Constraint::Percentage(width_pct),
            Constraint::Percentage((100 - width_pct) / 2),
        ])
        .split(area);
    horizontal[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ctrl_c_is_a_global_quit() {
        let key = crossterm::event::KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        match translate_key(key) {
            InputEvent::Global(GlobalKey::Quit) => {}
            _ => panic!("expected Quit"),
        }
    }

    #[test]
    fn plain_char_routes_to_form() {
        let key = crossterm::event::KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE);
        match translate_key(key) {
            InputEvent::Form(FormKey::Char(b'a')) => {}
            _ => panic!("expected Char(a)"),
        }
    }
}
