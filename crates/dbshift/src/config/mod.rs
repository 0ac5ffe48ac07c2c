//! Configuration loading and resolution.
//!
//! The effective [`Config`] is a pure function of three typed tiers, highest
//! precedence first: explicit command-line values ([`CliOverrides`]), the
//! JSON configuration file ([`FileConfig`]) and built-in [`Defaults`].

mod types;
mod validation;

pub use types::*;

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::drivers::SslMode;
use crate::error::{Result, ShiftError};
use crate::options::CliArgs;

/// Configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "dbshift.json";

impl FileConfig {
    /// Load a configuration file. A missing file is a `Config file not found` error.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ShiftError::config_not_found(path.display()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content).map_err(|e| {
            ShiftError::Config(format!(
                "Config file {} could not be parsed: {}",
                path.display(),
                e
            ))
        })
    }

    /// Parse configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Config {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }
}

/// Merge the three tiers into an effective configuration.
///
/// A value present in a higher tier always wins; `None` never masks a
/// lower tier. Type coercion (ports, versions, booleans) happens here.
pub fn merge(defaults: &Defaults, file: &FileConfig, cli: &CliOverrides) -> Result<Config> {
    let driver_name = cli
        .driver
        .clone()
        .or_else(|| file.driver.clone())
        .unwrap_or_else(|| defaults.driver.clone());
    let driver = Driver::parse(&driver_name)?;

    let port_text = cli
        .port
        .clone()
        .or_else(|| file.port.as_ref().map(Scalar::as_text));
    let port = match port_text {
        Some(text) => Some(parse_port(&text)?),
        None => driver.default_port(),
    };

    let migration_pattern = cli
        .migration_pattern
        .clone()
        .or_else(|| file.migration_pattern.clone())
        .or_else(|| file.migration_directory.as_deref().map(directory_pattern))
        .unwrap_or_else(|| defaults.migration_pattern.clone());

    let target_version = match cli
        .to
        .clone()
        .or_else(|| file.to.as_ref().map(Scalar::as_text))
    {
        Some(text) => TargetVersion::parse(&text)?,
        None => defaults.to,
    };

    let validate_checksum = match (cli.validate_checksum, &file.validate_checksum) {
        (Some(v), _) => v,
        (None, Some(scalar)) => scalar.as_bool("validateChecksum")?,
        (None, None) => defaults.validate_checksum,
    };

    let prompt_password = match (cli.prompt_password, &file.prompt_password) {
        (Some(v), _) => v,
        (None, Some(scalar)) => scalar.as_bool("promptPassword")?,
        (None, None) => defaults.prompt_password,
    };

    let ssl_mode = match cli.ssl_mode.as_deref().or(file.ssl_mode.as_deref()) {
        Some(mode) => mode.parse::<SslMode>()?,
        None => defaults.ssl_mode,
    };

    Ok(Config {
        driver,
        host: cli
            .host
            .clone()
            .or_else(|| file.host.clone())
            .unwrap_or_else(|| defaults.host.clone()),
        port,
        database: cli
            .database
            .clone()
            .or_else(|| file.database.clone())
            .unwrap_or_default(),
        username: cli.username.clone().or_else(|| file.username.clone()),
        password: cli.password.clone().or_else(|| file.password.clone()),
        migration_pattern,
        schema_table: cli
            .schema_table
            .clone()
            .or_else(|| file.schema_table.clone())
            .unwrap_or_else(|| defaults.schema_table.clone()),
        target_version,
        validate_checksum,
        prompt_password,
        ssl_mode,
        no_config_file: false,
        config_file: None,
        help: false,
        version: false,
    })
}

fn parse_port(text: &str) -> Result<u16> {
    text.trim()
        .parse::<u16>()
        .map_err(|_| ShiftError::Config(format!("Invalid port '{}'", text)))
}

fn directory_pattern(dir: &str) -> String {
    format!("{}/*", glob::Pattern::escape(dir.trim_end_matches(['/', '\\'])))
}

/// Resolves the effective configuration for one invocation.
#[derive(Debug, Clone)]
pub struct ConfigResolver {
    working_dir: PathBuf,
}

impl ConfigResolver {
    /// Create a resolver rooted at `working_dir`. Relative config paths and
    /// migration patterns resolve against it.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    /// Resolve command-line options into an effective configuration.
    pub fn resolve(&self, args: &CliArgs) -> Result<Config> {
        let loaded = self.load_file(args.config.as_deref(), args.no_config)?;
        let (config_file, file) = match loaded {
            Some((path, file)) => (Some(path), file),
            None => (None, FileConfig::default()),
        };

        let merged = merge(&Defaults::default(), &file, &args.overrides())?;
        let config = Config {
            migration_pattern: self.absolute_pattern(&merged.migration_pattern),
            no_config_file: args.no_config,
            config_file,
            help: args.help,
            version: args.version,
            ..merged
        };
        config.validate()?;

        debug!("Resolved configuration: {:?}", config);
        Ok(config)
    }

    /// Explicit path: always loaded, missing is an error. Otherwise the
    /// default file is read when present and not disabled.
    fn load_file(
        &self,
        explicit: Option<&Path>,
        no_config: bool,
    ) -> Result<Option<(PathBuf, FileConfig)>> {
        if let Some(path) = explicit {
            let path = self.working_dir.join(path);
            let file = FileConfig::load(&path)?;
            info!("Loaded configuration from {}", path.display());
            return Ok(Some((path, file)));
        }

        if no_config {
            return Ok(None);
        }

        let path = self.working_dir.join(DEFAULT_CONFIG_FILE);
        if !path.is_file() {
            return Ok(None);
        }
        let file = FileConfig::load(&path)?;
        info!("Loaded configuration from {}", path.display());
        Ok(Some((path, file)))
    }

    fn absolute_pattern(&self, pattern: &str) -> String {
        if Path::new(pattern).is_absolute() {
            pattern.to_string()
        } else {
            let base = glob::Pattern::escape(&self.working_dir.to_string_lossy());
            Path::new(&base).join(pattern).to_string_lossy().into_owned()
        }
    }
}
