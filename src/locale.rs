// =============================================================================
// vt-greeter — Locale / Phrase Table
//
// Owns every user-visible string the form can show: field labels, lock
// indicators, and one phrase per `GreeterError` variant. Loaded from
// `<datadir>/lang/<lang>.ini`; any key the file doesn't set falls back to
// the built-in English default, so a half-translated language file never
// leaves a label blank.
// =============================================================================

use std::collections::HashMap;
use std::path::Path;

/// A fully-resolved phrase table for one run of the process.
#[derive(Debug, Clone)]
pub struct Locale {
    phrases: HashMap<&'static str, String>,
}

const DEFAULTS: &[(&str, &str)] = &[
    ("session", "Session"),
    ("login", "Login:"),
    ("password", "Password:"),
    ("capslock", "Caps Lock"),
    ("numlock", "Num Lock"),
    ("logout", "Logged out"),
    ("restart", "Reboot"),
    ("shutdown", "Shutdown"),
    ("err_alloc", "Allocation error"),
    ("err_hostname", "Failed to get hostname"),
    ("err_console_dev", "Failed to open console device"),
    ("err_mlock", "Failed to lock password memory"),
    ("err_xsessions_dir", "Failed to access session directory"),
    ("err_xsessions_open", "Failed to open session directory"),
    ("err_pam_acct_expired", "This account is expired"),
    ("err_pam_auth", "Wrong password"),
    ("err_pam_authinfo_unavail", "Authentication info unavailable"),
    ("err_pam_buf", "Authentication buffer error"),
    ("err_pam_cred_err", "Failed to set credentials"),
    ("err_pam_cred_expired", "Your credentials have expired"),
    ("err_pam_cred_insufficient", "Insufficient credentials"),
    ("err_pam_cred_unavail", "Failed to fetch credentials"),
    ("err_pam_maxtries", "Too many auth tries"),
    ("err_pam_authok_reqd", "New authentication token required"),
    ("err_pam_perm_denied", "Permission denied"),
    ("err_pam_session", "Failed to open a session"),
    ("err_pam_sys", "System error"),
    ("err_pam_user_unknown", "Unknown user"),
    ("err_pam_abort", "Authentication aborted"),
    ("err_pwnam", "Failed to get user info"),
    ("err_path", "Failed to set PATH"),
    ("err_chdir", "Failed to change directory"),
    ("err_user_init", "Failed to initialize user groups"),
    ("err_user_gid", "Failed to set user gid"),
    ("err_user_uid", "Failed to set user uid"),
];

impl Locale {
    /// The built-in English table, used whenever no language file is found
    /// or a key is missing from one that is.
    fn defaults() -> HashMap<&'static str, String> {
        DEFAULTS
            .iter()
            .map(|(k, v)| (*k, v.to_string()))
            .collect()
    }

    /// Loads `<datadir>/lang/<lang>.ini`, filling gaps from the default
    /// table. A missing file simply yields the defaults outright.
    pub fn load(datadir: &Path, lang: &str) -> Self {
        let mut phrases = Self::defaults();
        let path = datadir.join("lang").join(format!("{lang}.ini"));

        if !path.exists() {
            tracing::info!(path = %path.display(), "language file not found, using built-in English table");
            return Self { phrases };
        }

        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                for (key, value) in parse_flat_ini(&contents) {
                    if let Some(slot) = DEFAULTS.iter().find(|(k, _)| *k == key).map(|(k, _)| *k) {
                        phrases.insert(slot, value);
                    }
                }
            }
            Err(err) => {
                tracing::warn!(%err, path = %path.display(), "failed to read language file, using defaults");
            }
        }

        Self { phrases }
    }

    /// Looks up a phrase by its locale key, falling back to the key itself
    /// if somehow absent (should not happen given `defaults()` seeds every
    /// known key).
    pub fn get(&self, key: &str) -> &str {
        self.phrases.get(key).map(String::as_str).unwrap_or(key)
    }
}

/// A minimal `key = value` line reader, deliberately not a general INI
/// grammar: language files have no sections, just flat key/value pairs, one
/// per line, with optional surrounding whitespace and `#`/`;` comments.
fn parse_flat_ini(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            out.push((key.trim().to_string(), value.trim().trim_matches('"').to_string()));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_language_file_yields_english_defaults() {
        let locale = Locale::load(Path::new("/nonexistent/datadir"), "xx");
        assert_eq!(locale.get("login"), "Login:");
        assert_eq!(locale.get("err_pam_auth"), "Wrong password");
    }

    #[test]
    fn partial_language_file_overrides_only_present_keys() {
        let dir = tempfile::tempdir().unwrap();
        let lang_dir = dir.path().join("lang");
        std::fs::create_dir_all(&lang_dir).unwrap();
        std::fs::write(lang_dir.join("fr.ini"), "login = Identifiant:\n").unwrap();

        let locale = Locale::load(dir.path(), "fr");
        assert_eq!(locale.get("login"), "Identifiant:");
        // Untranslated key still falls back to English.
        assert_eq!(locale.get("password"), "Password:");
    }
}
