// =============================================================================
// vt-greeter — Save File
//
// Two lines on disk: the last login name, then the last selected desktop
// index. Written after every successful submit when `config.save` is set;
// read back at startup when `config.load` is set, restoring the login text
// and (if still in range) the catalog's selected index.
// =============================================================================

use std::path::Path;

use crate::config::Config;
use crate::desktop::DesktopCatalog;
use crate::form::FormState;

/// Writes `login` and the catalog's current index to `config.save_file`.
/// A write failure is silently ignored — losing the save is not fatal to
/// the running session.
pub fn save(config: &Config, login: &str, cur: usize) {
    if !config.save {
        return;
    }

    let contents = format!("{login}\n{cur}");
    if let Err(err) = std::fs::write(&config.save_file, contents) {
        tracing::warn!(%err, path = %config.save_file.display(), "failed to write save file");
    }
}

/// Restores the login field and catalog index from `config.save_file`. A
/// missing file, or an out-of-range index, leaves the form's defaults
/// untouched.
pub fn load(config: &Config, form: &mut FormState) {
    if !config.load {
        return;
    }
    let Ok(contents) = std::fs::read_to_string(&config.save_file) else {
        return;
    };

    let mut lines = contents.lines();
    if let Some(login) = lines.next() {
        for byte in login.bytes() {
            form.login.write(byte);
        }
    }
    if let Some(cur_line) = lines.next() {
        if let Ok(cur) = cur_line.trim().parse::<i64>() {
            set_catalog_cur(&mut form.session, cur.unsigned_abs() as usize);
        }
    }
}

fn set_catalog_cur(catalog: &mut DesktopCatalog, cur: usize) {
    catalog.set_cur_if_valid(cur);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn form_with_config(config: &Config) -> FormState {
        let dc = DesktopCatalog::scan(
            std::path::Path::new("/none"),
            std::path::Path::new("/none"),
            ".xinitrc",
            true,
        );
        FormState::new(dc, config, 32).unwrap().0
    }

    #[test]
    fn round_trips_login_and_cursor() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.save_file = dir.path().join("save");
        config.save = true;
        config.load = true;

        save(&config, "alice", 1);

        let mut form = form_with_config(&config);
        load(&config, &mut form);

        assert_eq!(form.login.as_str(), "alice");
        assert_eq!(form.session.cur(), 1);
    }

    #[test]
    fn missing_file_leaves_defaults() {
        let config = Config {
            save_file: PathBuf::from("/nonexistent/save"),
            ..Config::default()
        };
        let mut form = form_with_config(&config);
        load(&config, &mut form);
        assert!(form.login.is_empty());
        assert_eq!(form.session.cur(), 0);
    }

    #[test]
    fn out_of_range_cursor_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.save_file = dir.path().join("save");
        std::fs::write(&config.save_file, "bob\n99").unwrap();

        let mut form = form_with_config(&config);
        load(&config, &mut form);
        assert_eq!(form.login.as_str(), "bob");
        assert_eq!(form.session.cur(), 0);
    }
}
