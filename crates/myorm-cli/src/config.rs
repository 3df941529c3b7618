use myorm::ForeignKeyMode;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Overrides the default connection's URL when set.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub config_path: PathBuf,
    pub config_dir: PathBuf,
    pub file: ConfigFile,
}

impl ProjectConfig {
    /// Read, expand and validate a config file.
    ///
    /// A `.env` file, if present, is loaded before `${VAR}` references are
    /// expanded.
    pub fn load(config_path: PathBuf) -> anyhow::Result<Self> {
        let config_dir = config_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();

        let raw = std::fs::read_to_string(&config_path).map_err(|e| {
            anyhow::anyhow!(
                "failed to read config file {}: {e}",
                config_path.display()
            )
        })?;

        let _ = dotenvy::dotenv();
        let file = ConfigFile::parse(&raw).map_err(|e| {
            anyhow::anyhow!(
                "failed to load config file {}: {e}",
                config_path.display()
            )
        })?;

        Ok(Self {
            config_path,
            config_dir,
            file,
        })
    }

    pub fn resolve_path(&self, p: impl AsRef<Path>) -> PathBuf {
        let p = p.as_ref();
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.config_dir.join(p)
        }
    }

    /// Pick a connection and its URL.
    ///
    /// Precedence for the URL: `--database`, then `DATABASE_URL` (default
    /// connection only), then the config file.
    pub fn connection(
        &self,
        name: Option<&str>,
        url_override: Option<&str>,
    ) -> anyhow::Result<(String, String)> {
        let name = match name {
            Some(n) => n.to_string(),
            None => self.file.default_connection()?.to_string(),
        };
        let Some(conn) = self.file.connections.get(&name) else {
            anyhow::bail!(
                "unknown connection `{name}` in {}",
                self.config_path.display()
            );
        };

        if let Some(url) = url_override {
            return Ok((name, url.to_string()));
        }
        let is_default = self.file.default_connection().ok() == Some(name.as_str());
        if is_default {
            if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
                if !url.trim().is_empty() {
                    return Ok((name, url));
                }
            }
        }
        Ok((name, conn.url.clone()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub version: String,
    pub default_connection: Option<String>,

    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionConfig>,

    pub models: Option<ModelsConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionConfig {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelsConfig {
    /// Root of the generated tree; each connection gets `c_<name>/base/`.
    pub out: String,

    #[serde(default)]
    pub foreign_keys: ForeignKeyMode,

    /// Tables to generate. Empty means every table.
    #[serde(default)]
    pub tables: Vec<String>,

    /// SQL type (without length, lowercase) to Rust type overrides.
    #[serde(default)]
    pub types: BTreeMap<String, String>,
}

impl ConfigFile {
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let mut file: ConfigFile = toml::from_str(raw)?;
        file.expand_env()?;
        file.validate()?;
        Ok(file)
    }

    /// The configured default, or the only connection.
    pub fn default_connection(&self) -> anyhow::Result<&str> {
        if let Some(name) = &self.default_connection {
            return Ok(name);
        }
        let mut names = self.connections.keys();
        match (names.next(), names.next()) {
            (Some(only), None) => Ok(only),
            _ => anyhow::bail!("default_connection must be set when several connections exist"),
        }
    }

    fn expand_env(&mut self) -> anyhow::Result<()> {
        for conn in self.connections.values_mut() {
            conn.url = expand_env_vars(&conn.url)?;
        }
        if let Some(models) = self.models.as_mut() {
            models.out = expand_env_vars(&models.out)?;
            for v in models.types.values_mut() {
                *v = expand_env_vars(v)?;
            }
        }
        Ok(())
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.version.trim() != "1" {
            anyhow::bail!("unsupported config version: {}", self.version);
        }
        if self.connections.is_empty() {
            anyhow::bail!("at least one [connections.<name>] entry is required");
        }
        for (name, conn) in &self.connections {
            if !is_connection_name(name) {
                anyhow::bail!("invalid connection name `{name}`: use letters, digits and `_`");
            }
            if conn.url.trim().is_empty() {
                anyhow::bail!("connections.{name}.url must not be empty");
            }
        }
        if let Some(name) = &self.default_connection {
            if !self.connections.contains_key(name) {
                anyhow::bail!("default_connection `{name}` is not a configured connection");
            }
        }
        if let Some(models) = &self.models {
            if models.out.trim().is_empty() {
                anyhow::bail!("models.out must not be empty");
            }
        }
        Ok(())
    }
}

/// Connection names end up in directory and module names.
fn is_connection_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn expand_env_vars(input: &str) -> anyhow::Result<String> {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut key = String::new();
            let mut closed = false;
            for ch in chars.by_ref() {
                if ch == '}' {
                    closed = true;
                    break;
                }
                key.push(ch);
            }

            if !closed {
                anyhow::bail!("unterminated env var reference: ${{{key}");
            }
            if key.is_empty() {
                anyhow::bail!("invalid env var reference: ${{}}");
            }

            let v = std::env::var(&key)
                .map_err(|_| anyhow::anyhow!("missing env var for config expansion: {key}"))?;
            out.push_str(&v);
            continue;
        }

        out.push(c);
    }

    Ok(out)
}
