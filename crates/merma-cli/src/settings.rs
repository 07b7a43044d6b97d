//! Layered configuration: defaults, then `merma.toml`, then `MERMA_*`
//! environment variables.
//!
//! ```toml
//! [warehouse]
//! path = "~/data/merma.db"
//!
//! [extract]
//! path       = "exports/merma_2024.csv"
//! delimiter  = ";"
//! encoding   = "windows-1252"
//! date_order = "day_first"    # default "month_first"
//! ```
//!
//! Nested keys use a double underscore in the environment, e.g.
//! `MERMA_WAREHOUSE__PATH` or `MERMA_EXTRACT__ENCODING`.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use merma_extract::ExtractOptions;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  pub warehouse: WarehouseSettings,
  #[serde(default)]
  pub extract:   Option<ExtractOptions>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WarehouseSettings {
  /// SQLite database file. A leading `~/` expands to `$HOME`.
  pub path: PathBuf,
}

impl Settings {
  /// Build settings from `file` (optional) and the environment.
  /// `extract` overrides the configured extract path.
  pub fn load(file: &Path, extract: Option<&Path>) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .set_default("warehouse.path", "merma.db")?
      .add_source(config::File::from(file).required(false))
      .add_source(
        config::Environment::with_prefix("MERMA")
          .prefix_separator("_")
          .separator("__"),
      )
      .set_override_option("extract.path", extract.map(|p| p.display().to_string()))?
      .build()
      .with_context(|| format!("failed to read configuration from {}", file.display()))?;

    let mut settings: Settings = settings
      .try_deserialize()
      .context("failed to deserialise settings")?;
    settings.warehouse.path = expand_tilde(&settings.warehouse.path);
    if let Some(extract) = settings.extract.as_mut() {
      extract.path = expand_tilde(&extract.path);
    }
    Ok(settings)
  }

  /// The extract to load, or an error telling the user how to name one.
  pub fn extract(&self) -> anyhow::Result<&ExtractOptions> {
    self
      .extract
      .as_ref()
      .context("no extract configured; pass --extract PATH or set [extract] path")
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use merma_extract::DateOrder;

  use super::*;

  #[test]
  fn defaults_apply_without_a_file() {
    let settings =
      Settings::load(Path::new("does-not-exist.toml"), Some(Path::new("in.csv"))).unwrap();
    assert_eq!(settings.warehouse.path, PathBuf::from("merma.db"));

    let extract = settings.extract().unwrap();
    assert_eq!(extract.path, PathBuf::from("in.csv"));
    assert_eq!(extract.format.delimiter, ',');
    assert_eq!(extract.format.encoding, "utf-8");
    assert_eq!(extract.format.date_order, DateOrder::MonthFirst);
  }

  #[test]
  fn file_sets_extract_format() {
    let file = std::env::temp_dir().join("merma-settings-date-order.toml");
    std::fs::write(
      &file,
      "[extract]\npath = \"in.csv\"\ndelimiter = \";\"\ndate_order = \"day_first\"\n",
    )
    .unwrap();

    let settings = Settings::load(&file, None).unwrap();
    let format = &settings.extract().unwrap().format;
    assert_eq!(format.delimiter, ';');
    assert_eq!(format.date_order, DateOrder::DayFirst);
    std::fs::remove_file(&file).unwrap();
  }

  #[test]
  fn missing_extract_is_reported() {
    let settings = Settings::load(Path::new("does-not-exist.toml"), None).unwrap();
    assert!(settings.extract().is_err());
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/merma.db")), PathBuf::from(home).join("merma.db"));
    assert_eq!(expand_tilde(Path::new("/tmp/merma.db")), PathBuf::from("/tmp/merma.db"));
  }
}
