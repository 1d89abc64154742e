// =============================================================================
// vt-greeter — Main Loop
//
// Wires every other module together: poll the terminal, route global keys
// ahead of the form, authenticate and launch a session on submit, and
// redraw. Runs until a global quit key is pressed or the process receives
// a terminating signal.
// =============================================================================

use std::time::Duration;

use crate::config::Config;
use crate::error::Diagnostics;
use crate::form::{FormOutcome, FormState};
use crate::locale::Locale;
use crate::session::{self, LaunchRequest};
use crate::tty;
use crate::ui::{GlobalKey, InputEvent, Screen};
use crate::{auth, desktop, save};

/// Runs the greeter until the user quits. Returns the process exit code
/// per SPEC_FULL.md §6 (0 on a clean quit, non-zero on a setup failure that
/// prevented the form from ever being shown).
pub fn run(config: &Config, locale: &Locale) -> i32 {
    // Constructed first so the deferred non-fatal warnings below (mlock,
    // hostname) have somewhere to land the moment they're known.
    let mut diagnostics = Diagnostics::new();

    if let Err(err) = tty::activate(&config.console_dev, config.tty) {
        tracing::warn!(%err, "failed to activate configured vt");
    }

    let catalog = desktop::DesktopCatalog::scan(
        &config.xsessions_dir,
        &config.waylandsessions_dir,
        &config.xinitrc,
        config.wayland_specifier,
    );

    let visible_len = 32;
    let (mut form, mlock_warning) = match FormState::new(catalog, config, visible_len) {
        Ok(pair) => pair,
        Err(err) => {
            tracing::error!(%err, "failed to allocate form buffers");
            return 1;
        }
    };
    if let Some(err) = mlock_warning {
        diagnostics.record(locale.get(err.locale_key()));
    }

    save::load(config, &mut form);

    let (mut screen, hostname_warning) = match Screen::init() {
        Ok(pair) => pair,
        Err(err) => {
            tracing::error!(%err, "failed to initialize terminal");
            return 1;
        }
    };
    if let Some(err) = hostname_warning {
        diagnostics.record(locale.get(err.locale_key()));
    }

    let mut fail_count: u32 = 0;
    let min_refresh = Duration::from_millis(config.min_refresh_delta_ms);

    loop {
        let locks = tty::led_state(&config.console_dev);
        if let Err(err) = screen.draw(config, locale, &form, &diagnostics, locks) {
            tracing::error!(%err, "failed to draw frame");
            return 1;
        }

        let event = match screen.poll(min_refresh) {
            Ok(event) => event,
            Err(err) => {
                tracing::error!(%err, "failed to poll terminal events");
                return 1;
            }
        };

        match event {
            InputEvent::Tick | InputEvent::Resize => continue,
            InputEvent::Global(GlobalKey::Quit) => return 0,
            InputEvent::Global(GlobalKey::Shutdown) => {
                drop(screen);
                power_off(config, "-h", "now");
                return 0;
            }
            InputEvent::Global(GlobalKey::Reboot) => {
                drop(screen);
                power_off(config, "-r", "now");
                return 0;
            }
            InputEvent::Form(key) => {
                if form.handle_key(key) == FormOutcome::Submit {
                    submit(config, locale, &mut form, &mut diagnostics, &mut fail_count, &mut screen);
                }
            }
        }
    }
}

/// Execs the configured halt command with `flag`/`arg` (`-h now` or `-r
/// now`). Runs after the terminal has already been torn down, matching the
/// original's "shut down from the raw console, not the UI" ordering. A
/// failed exec is logged; the caller still returns 0 either way since the
/// user's intent was to leave the loop, not to retry the form.
fn power_off(config: &Config, flag: &str, arg: &str) {
    use std::os::unix::process::CommandExt;
    let err = std::process::Command::new(&config.shutdown_cmd).arg(flag).arg(arg).exec();
    tracing::error!(%err, cmd = %config.shutdown_cmd.display(), "failed to exec halt command");
}

/// Authenticates the current form contents and, on success, launches the
/// selected session. Always clears the password field afterward; the login
/// field and session choice are preserved so a failed retry doesn't make
/// the user re-type everything.
fn submit(
    config: &Config,
    locale: &Locale,
    form: &mut FormState,
    diagnostics: &mut Diagnostics,
    fail_count: &mut u32,
    screen: &mut Screen,
) {
    let login = form.login.as_str().to_string();
    let mut password = form.password.as_str().to_string();

    let auth_result = auth::authenticate(&config.service_name, &login, &password);
    // The plaintext copy handed to `authenticate` above is a second buffer
    // outside the `CredentialBuffer`'s own mlock'd storage; it must be
    // wiped as soon as PAM is done with it, not just the `CredentialBuffer`
    // (`form.password.clear()` below), since this local is still on the
    // stack when `session::launch` forks the session child further down.
    auth::zeroize_string(&mut password);

    let handle = match auth_result {
        Ok(handle) => handle,
        Err(err) => {
            *fail_count += 1;
            diagnostics.record(locale.get(err.locale_key()));
            form.password.clear();
            // Login is only cleared for an unknown user; any other failure
            // leaves it as-is so the user can retry the password alone.
            if err == crate::error::GreeterError::PamUserUnknown {
                form.login.clear();
            }
            if *fail_count >= config.auth_fail_threshold {
                tracing::warn!(count = *fail_count, "authentication failure threshold reached");
            }
            return;
        }
    };

    *fail_count = 0;

    let pwd = match session::resolve_user(&login) {
        Ok(pwd) => pwd,
        Err(err) => {
            diagnostics.record(locale.get(err.locale_key()));
            let _ = handle.close();
            form.password.clear();
            return;
        }
    };

    save::save(config, &login, form.session.cur());
    form.password.clear();

    let pam_env = handle.environment();
    let request = LaunchRequest {
        pwd: &pwd,
        desktop: form.session.current(),
        tty: config.tty,
        pam_env,
    };

    if let Err(err) = screen.suspend() {
        tracing::warn!(%err, "failed to suspend terminal before session launch");
    }

    let status = session::launch(config, &request);

    if let Err(err) = screen.resume() {
        tracing::error!(%err, "failed to resume terminal after session exit");
    }

    if let Err(err) = status {
        diagnostics.record(locale.get(err.locale_key()));
    }

    if let Err(err) = handle.close() {
        tracing::warn!(%err, "error tearing down PAM session");
    }

    tty::reset_terminal(&pwd.shell, &config.term_reset_cmd);

    // Sessions may have been installed or removed while this one ran;
    // re-scan unconditionally and keep the previously-selected index.
    let prev_cur = form.session.cur();
    form.session = desktop::DesktopCatalog::scan(
        &config.xsessions_dir,
        &config.waylandsessions_dir,
        &config.xinitrc,
        config.wayland_specifier,
    );
    form.session.set_cur_if_valid(prev_cur);
}

