//! Where qsb keeps its two files on disk: `config.toml` and the click
//! history.
//!
//! Both live under a `qsb/` folder in the platform directory that [`dirs`]
//! reports (on Linux, `~/.config/qsb/` and `~/.local/share/qsb/`). Tests
//! and packaged installs can point either folder elsewhere with
//! `QSB_CONFIG_DIR` or `QSB_DATA_DIR`.

use std::path::PathBuf;

const APP: &str = "qsb";

/// `env` if set, else `base()/qsb`, else `fallback` when the platform has
/// no such directory.
fn resolve(env: &str, base: fn() -> Option<PathBuf>, fallback: &str) -> PathBuf {
    std::env::var_os(env)
        .map(PathBuf::from)
        .or_else(|| base().map(|d| d.join(APP)))
        .unwrap_or_else(|| PathBuf::from(fallback))
}

/// Folder holding the click history.
#[must_use]
pub fn data_dir() -> PathBuf {
    resolve("QSB_DATA_DIR", dirs::data_dir, "/tmp/qsb-data")
}

/// Folder searched for `config.toml` when no other location applies.
#[must_use]
pub fn config_dir() -> PathBuf {
    resolve("QSB_CONFIG_DIR", dirs::config_dir, "/tmp/qsb-config")
}

/// Default click history file, `history.json` in [`data_dir`].
#[must_use]
pub fn history_file() -> PathBuf {
    data_dir().join("history.json")
}
