use crate::core::db::connection::{Charset, ConnectOptions};
use crate::core::value::RowFormat;
use crate::core::{DbError, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Extension a defaults file must carry.
pub const DEFAULTS_EXTENSION: &str = "cnf";

/// Top-level structure of a defaults file, parsed as TOML.
#[derive(Debug, Default, Deserialize)]
pub struct DefaultsFile {
    #[serde(default)]
    pub client: ClientSection,
}

/// The `[client]` table. Missing keys fall back to [`ConnectOptions::default`].
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClientSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    #[serde(alias = "charset")]
    pub default_character_set: Option<Charset>,
    pub row_format: Option<RowFormat>,
}

impl ClientSection {
    /// Builds connection options. A relative `database` path is resolved
    /// against `base_dir`.
    pub fn into_options(self, base_dir: Option<&Path>) -> ConnectOptions {
        let defaults = ConnectOptions::default();
        let database = match (self.database, base_dir) {
            (Some(db), Some(dir)) if db != ":memory:" && Path::new(&db).is_relative() => {
                dir.join(db).to_string_lossy().into_owned()
            }
            (Some(db), _) => db,
            (None, _) => defaults.database,
        };

        ConnectOptions {
            host: self.host.unwrap_or(defaults.host),
            port: self.port.unwrap_or(defaults.port),
            user: self.user.unwrap_or(defaults.user),
            password: self.password.unwrap_or(defaults.password),
            database,
            charset: self.default_character_set.unwrap_or(defaults.charset),
            row_format: self.row_format.unwrap_or(defaults.row_format),
        }
    }
}

/// Checks that `path` exists and has the `.cnf` extension.
pub fn validate_defaults_path(path: &Path) -> Result<()> {
    let has_extension = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case(DEFAULTS_EXTENSION))
        .unwrap_or(false);
    if !has_extension {
        return Err(DbError::DefaultsFile(format!(
            "{} is not a .{} file",
            path.display(),
            DEFAULTS_EXTENSION
        )));
    }
    if !path.is_file() {
        return Err(DbError::DefaultsFile(format!("{} does not exist", path.display())));
    }
    Ok(())
}

/// Loads connection options from a defaults file.
///
/// # Example
///
/// ```no_run
/// let options = dbhandle::config::load_defaults("client.cnf".as_ref())?;
/// println!("{:?}", options);
/// # Ok::<(), dbhandle::DbError>(())
/// ```
pub fn load_defaults(path: &Path) -> Result<ConnectOptions> {
    validate_defaults_path(path)?;
    let content = fs::read_to_string(path)?;
    let file: DefaultsFile = toml::from_str(&content)?;
    let base_dir = path.parent().filter(|dir| !dir.as_os_str().is_empty());
    Ok(file.client.into_options(base_dir))
}
