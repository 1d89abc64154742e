// =============================================================================
// vt-greeter — Desktop Catalog
//
// Scans the Xorg and Wayland session directories for `.desktop` files and
// builds the ordered list of selectable sessions, with the `Shell` and
// `XInitrc` built-ins always present first.
// =============================================================================

use std::fs;
use std::path::Path;

use crate::error::GreeterError;

/// Which kind of session a desktop entry launches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayServerKind {
    Shell,
    XInitrc,
    Xorg,
    Wayland,
}

/// One selectable session: a human-readable name and the command used to
/// launch it (empty for the built-ins, which have their own launch path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopEntry {
    pub display_name: String,
    pub exec: String,
    pub kind: DisplayServerKind,
}

/// The ordered session list plus the currently-selected index.
pub struct DesktopCatalog {
    entries: Vec<DesktopEntry>,
    cur: usize,
}

impl DesktopCatalog {
    pub fn entries(&self) -> &[DesktopEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cur(&self) -> usize {
        self.cur
    }

    pub fn current(&self) -> &DesktopEntry {
        &self.entries[self.cur]
    }

    pub fn move_cur(&mut self, dir: crate::credential::Direction) {
        use crate::credential::Direction;
        match dir {
            Direction::Right if self.cur + 1 < self.entries.len() => self.cur += 1,
            Direction::Left if self.cur > 0 => self.cur -= 1,
            _ => {}
        }
    }

    /// Restores a previously-saved index, ignoring it if out of range.
    pub fn set_cur_if_valid(&mut self, cur: usize) {
        if cur < self.entries.len() {
            self.cur = cur;
        }
    }

    /// Scans `xdir` and `wdir`, appending crawled entries after the two
    /// built-ins. Directory errors are non-fatal: the catalog still comes
    /// back valid with just `Shell` and `XInitrc`.
    pub fn scan(xdir: &Path, wdir: &Path, xinitrc: &str, wayland_suffix: bool) -> Self {
        let mut entries = vec![
            DesktopEntry {
                display_name: "Shell".to_string(),
                exec: String::new(),
                kind: DisplayServerKind::Shell,
            },
            DesktopEntry {
                display_name: "Xinitrc".to_string(),
                exec: xinitrc.to_string(),
                kind: DisplayServerKind::XInitrc,
            },
        ];

        match crawl(wdir) {
            Ok(found) => {
                for (name, exec) in found {
                    let display_name = if wayland_suffix && !name.contains(" (Wayland)") {
                        format!("{name} (Wayland)")
                    } else {
                        name
                    };
                    entries.push(DesktopEntry {
                        display_name,
                        exec,
                        kind: DisplayServerKind::Wayland,
                    });
                }
            }
            Err(err) => tracing::info!(dir = %wdir.display(), %err, "wayland session directory unavailable"),
        }

        match crawl(xdir) {
            Ok(found) => {
                for (name, exec) in found {
                    entries.push(DesktopEntry {
                        display_name: name,
                        exec,
                        kind: DisplayServerKind::Xorg,
                    });
                }
            }
            Err(err) => tracing::info!(dir = %xdir.display(), %err, "xorg session directory unavailable"),
        }

        Self { entries, cur: 0 }
    }
}

/// Reads every non-dotfile in `dir` and parses `Name=`/`Exec=` out of its
/// `[Desktop Entry]` section. Entries missing either key are skipped.
fn crawl(dir: &Path) -> Result<Vec<(String, String)>, GreeterError> {
    let read_dir = fs::read_dir(dir).map_err(|_| GreeterError::XSessionsDir)?;

    let mut found = Vec::new();
    for entry in read_dir {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => return Err(GreeterError::XSessionsOpen),
        };

        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();
        if file_name.starts_with('.') {
            continue;
        }

        let contents = match fs::read_to_string(entry.path()) {
            Ok(c) => c,
            Err(_) => continue,
        };

        if let Some((name, exec)) = parse_desktop_entry(&contents) {
            found.push((name, exec));
        }
    }

    Ok(found)
}

/// Single-pass `[Desktop Entry]` reader: scans for `Name=` and `Exec=`
/// prefixes and stops as soon as both are found. Not a general
/// freedesktop-entry parser — multiple sections, localized keys
/// (`Name[xx]=`), and comments are intentionally not handled.
fn parse_desktop_entry(contents: &str) -> Option<(String, String)> {
    let mut in_section = false;
    let mut name = None;
    let mut exec = None;

    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('[') {
            in_section = trimmed == "[Desktop Entry]";
            continue;
        }
        if !in_section {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("Name=") {
            name = Some(rest.trim().to_string());
        } else if let Some(rest) = trimmed.strip_prefix("Exec=") {
            exec = Some(rest.trim().to_string());
        }

        if name.is_some() && exec.is_some() {
            break;
        }
    }

    match (name, exec) {
        (Some(n), Some(e)) => Some((n, e)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_dirs_yield_only_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let dc = DesktopCatalog::scan(&missing, &missing, ".xinitrc", true);
        assert_eq!(dc.len(), 2);
        assert_eq!(dc.entries()[0].kind, DisplayServerKind::Shell);
        assert_eq!(dc.entries()[1].kind, DisplayServerKind::XInitrc);
        assert_eq!(dc.cur(), 0);
    }

    #[test]
    fn crawled_xorg_entries_follow_builtins() {
        let dir = tempfile::tempdir().unwrap();
        let xdir = dir.path().join("xsessions");
        std::fs::create_dir_all(&xdir).unwrap();
        std::fs::write(
            xdir.join("plasma.desktop"),
            "[Desktop Entry]\nName=Plasma\nExec=/usr/bin/startplasma-x11\n",
        )
        .unwrap();
        std::fs::write(xdir.join("broken.desktop"), "[Desktop Entry]\nName=Broken\n").unwrap();

        let wdir = dir.path().join("missing-wayland");
        let dc = DesktopCatalog::scan(&xdir, &wdir, ".xinitrc", true);

        assert_eq!(dc.len(), 3);
        assert_eq!(dc.entries()[2].display_name, "Plasma");
        assert_eq!(dc.entries()[2].kind, DisplayServerKind::Xorg);
    }

    #[test]
    fn wayland_name_gets_suffixed_once() {
        let dir = tempfile::tempdir().unwrap();
        let wdir = dir.path().join("wayland-sessions");
        std::fs::create_dir_all(&wdir).unwrap();
        std::fs::write(wdir.join("sway.desktop"), "[Desktop Entry]\nName=Sway\nExec=sway\n").unwrap();

        let xdir = dir.path().join("missing-x");
        let dc = DesktopCatalog::scan(&xdir, &wdir, ".xinitrc", true);

        assert_eq!(dc.entries()[2].display_name, "Sway (Wayland)");

        // Re-scanning (simulating the name already containing the suffix)
        // must not double it.
        std::fs::write(
            wdir.join("sway.desktop"),
            "[Desktop Entry]\nName=Sway (Wayland)\nExec=sway\n",
        )
        .unwrap();
        let dc2 = DesktopCatalog::scan(&xdir, &wdir, ".xinitrc", true);
        assert_eq!(dc2.entries()[2].display_name, "Sway (Wayland)");
    }

    #[test]
    fn move_cur_clamps_at_edges() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let mut dc = DesktopCatalog::scan(&missing, &missing, ".xinitrc", true);
        dc.move_cur(crate::credential::Direction::Left);
        assert_eq!(dc.cur(), 0);
        dc.move_cur(crate::credential::Direction::Right);
        assert_eq!(dc.cur(), 1);
        dc.move_cur(crate::credential::Direction::Right);
        assert_eq!(dc.cur(), 1);
    }

    #[test]
    fn set_cur_if_valid_ignores_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let mut dc = DesktopCatalog::scan(&missing, &missing, ".xinitrc", true);
        dc.set_cur_if_valid(99);
        assert_eq!(dc.cur(), 0);
        dc.set_cur_if_valid(1);
        assert_eq!(dc.cur(), 1);
    }
}
