// =============================================================================
// vt-greeter — Configuration
//
// A single immutable `Config` record, built once at startup and threaded
// through every component by reference. Backed by the `config` crate's INI
// reader so the on-disk format (and its defaulting behavior) matches the
// original system without us hand-rolling an INI grammar.
// =============================================================================

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Default path to the configuration file, used when no positional argument
/// overrides it on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/ly/config.ini";

/// Where session save state is written/read by default.
const DEFAULT_SAVE_FILE: &str = "/etc/ly/save";

/// Process-wide, immutable configuration. Constructed once in `main` and
/// passed down by `&Config` — never mutated after `load` returns.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tty: u32,
    pub console_dev: PathBuf,
    pub service_name: String,

    pub save: bool,
    pub load: bool,
    pub save_file: PathBuf,

    pub path: String,

    pub mcookie_cmd: PathBuf,
    pub x_cmd: PathBuf,
    pub x_cmd_setup: PathBuf,
    pub wayland_cmd: PathBuf,
    pub xauth_cmd: PathBuf,
    pub xinitrc: String,
    pub term_reset_cmd: String,
    pub shutdown_cmd: PathBuf,

    pub xsessions_dir: PathBuf,
    pub waylandsessions_dir: PathBuf,
    pub wayland_specifier: bool,

    pub max_login_len: usize,
    pub max_password_len: usize,

    pub min_refresh_delta_ms: u64,
    pub auth_fail_threshold: u32,

    pub lang: String,
    pub datadir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tty: 2,
            console_dev: PathBuf::from("/dev/console"),
            service_name: "login".to_string(),

            save: true,
            load: true,
            save_file: PathBuf::from(DEFAULT_SAVE_FILE),

            path: String::new(),

            mcookie_cmd: PathBuf::from("/usr/bin/mcookie"),
            x_cmd: PathBuf::from("/usr/bin/X"),
            x_cmd_setup: PathBuf::from("/etc/ly/xsetup.sh"),
            wayland_cmd: PathBuf::from("/etc/ly/wsetup.sh"),
            xauth_cmd: PathBuf::from("/usr/bin/xauth"),
            xinitrc: ".xinitrc".to_string(),
            term_reset_cmd: "/usr/bin/tput reset".to_string(),
            shutdown_cmd: PathBuf::from("/sbin/shutdown"),

            xsessions_dir: PathBuf::from("/usr/share/xsessions"),
            waylandsessions_dir: PathBuf::from("/usr/share/wayland-sessions"),
            wayland_specifier: true,

            max_login_len: 256,
            max_password_len: 256,

            min_refresh_delta_ms: 16,
            auth_fail_threshold: 10,

            lang: "en".to_string(),
            datadir: PathBuf::from("/usr/share/ly"),
        }
    }
}

impl Config {
    /// Loads configuration from `path`, falling back to built-in defaults
    /// entry-by-entry when the file is missing or a key is absent. A
    /// missing file is logged, not an error — this mirrors the original
    /// system's "no config, just use the constants" behavior.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            tracing::info!(path = %path.display(), "config file not found, using built-in defaults");
            return Self::default();
        }

        let builder = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Ini).required(false));

        match builder.build() {
            Ok(source) => match source.try_deserialize::<PartialConfig>() {
                Ok(partial) => partial.merge_onto(Self::default()),
                Err(err) => {
                    tracing::warn!(%err, path = %path.display(), "failed to parse config, using defaults");
                    Self::default()
                }
            },
            Err(err) => {
                tracing::warn!(%err, path = %path.display(), "failed to read config, using defaults");
                Self::default()
            }
        }
    }
}

/// Mirrors `Config` but with every field optional, so a partially-specified
/// INI file only overrides the keys it actually sets.
#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    tty: Option<u32>,
    console_dev: Option<PathBuf>,
    service_name: Option<String>,
    save: Option<bool>,
    load: Option<bool>,
    save_file: Option<PathBuf>,
    path: Option<String>,
    mcookie_cmd: Option<PathBuf>,
    x_cmd: Option<PathBuf>,
    x_cmd_setup: Option<PathBuf>,
    wayland_cmd: Option<PathBuf>,
    xauth_cmd: Option<PathBuf>,
    xinitrc: Option<String>,
    term_reset_cmd: Option<String>,
    shutdown_cmd: Option<PathBuf>,
    xsessions_dir: Option<PathBuf>,
    waylandsessions_dir: Option<PathBuf>,
    wayland_specifier: Option<bool>,
    max_login_len: Option<usize>,
    max_password_len: Option<usize>,
    min_refresh_delta_ms: Option<u64>,
    auth_fail_threshold: Option<u32>,
    lang: Option<String>,
    datadir: Option<PathBuf>,
}

impl PartialConfig {
    fn merge_onto(self, mut base: Config) -> Config {
        macro_rules! take {
            ($field:ident) => {
                if let Some(v) = self.$field {
                    base.$field = v;
                }
            };
        }
        take!(tty);
        take!(console_dev);
        take!(service_name);
        take!(save);
        take!(load);
        take!(save_file);
        take!(path);
        take!(mcookie_cmd);
        take!(x_cmd);
        take!(x_cmd_setup);
        take!(wayland_cmd);
        take!(xauth_cmd);
        take!(xinitrc);
        take!(term_reset_cmd);
        take!(shutdown_cmd);
        take!(xsessions_dir);
        take!(waylandsessions_dir);
        take!(wayland_specifier);
        take!(max_login_len);
        take!(max_password_len);
        take!(min_refresh_delta_ms);
        take!(auth_fail_threshold);
        take!(lang);
        take!(datadir);
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let cfg = Config::load(Path::new("/nonexistent/path/config.ini"));
        assert_eq!(cfg.tty, 2);
        assert_eq!(cfg.service_name, "login");
    }

    #[test]
    fn partial_ini_overrides_only_named_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.ini");
        std::fs::write(&path, "tty = 4\nservice_name = \"greeter\"\n").unwrap();

        let cfg = Config::load(&path);
        assert_eq!(cfg.tty, 4);
        assert_eq!(cfg.service_name, "greeter");
        // Untouched keys keep their defaults.
        assert_eq!(cfg.max_login_len, 256);
    }
}
