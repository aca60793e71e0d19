//! Configuration.
//!
//! The configuration is read from a TOML file. When the `cli` feature is
//! enabled, [`ConfigArgs`] provides command line options that override
//! values from the file.
//!
//! A minimal configuration file looks like this:
//!
//! ```toml
//! region = "eu-central-1"
//! bucket = "signatures"
//! ```

use std::{error, fmt, fs, io};
use std::path::{Path, PathBuf};
use serde::Deserialize;


//------------ Config --------------------------------------------------------

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// The port the admission webhook listens on.
    pub port: u16,

    /// The log level.
    ///
    /// One of `error`, `warn`, `info`, `debug`, and `trace`.
    pub log_level: String,

    /// The directory holding the webhook’s TLS certificate and key.
    pub tls_cert_dir: PathBuf,

    /// The base name of the TLS certificate and key files.
    pub tls_pair_name: String,

    /// The region of the registry and object storage.
    pub region: String,

    /// The object storage bucket holding the signature bundles.
    pub bucket: String,

    /// A PEM file with additional trust anchors.
    pub trust_anchors: Option<PathBuf>,
}

impl Config {
    /// Parses a configuration from TOML content.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Toml)
    }

    /// Reads the configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|err| {
            ConfigError::Io(path.into(), err)
        })?;
        Self::from_toml(&content)
    }

    /// Checks that all required values are present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.region.is_empty() {
            return Err(ConfigError::Invalid("region"))
        }
        if self.bucket.is_empty() {
            return Err(ConfigError::Invalid("bucket"))
        }
        Ok(())
    }

    pub fn cert_file(&self) -> PathBuf {
        self.tls_cert_dir.join(format!("{}.crt", self.tls_pair_name))
    }

    pub fn key_file(&self) -> PathBuf {
        self.tls_cert_dir.join(format!("{}.key", self.tls_pair_name))
    }

    /// Returns the log level as a filter for the `log` crate.
    pub fn log_filter(&self) -> Result<log::LevelFilter, ConfigError> {
        self.log_level.parse().map_err(|_| {
            ConfigError::LogLevel(self.log_level.clone())
        })
    }

    /// Applies command line overrides.
    #[cfg(feature = "cli")]
    pub fn apply_args(&mut self, args: ConfigArgs) {
        if let Some(port) = args.port {
            self.port = port
        }
        if let Some(level) = args.log_level {
            self.log_level = level
        }
        if let Some(dir) = args.tls_cert_dir {
            self.tls_cert_dir = dir
        }
        if let Some(name) = args.tls_pair_name {
            self.tls_pair_name = name
        }
        if let Some(region) = args.region {
            self.region = region
        }
        if let Some(bucket) = args.bucket {
            self.bucket = bucket
        }
        if args.trust_anchors.is_some() {
            self.trust_anchors = args.trust_anchors
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 443,
            log_level: "debug".into(),
            tls_cert_dir: "/var/run/manifest-sig/certs".into(),
            tls_pair_name: "tls".into(),
            region: String::new(),
            bucket: String::new(),
            trust_anchors: None,
        }
    }
}


//------------ ConfigArgs ----------------------------------------------------

/// Command line options overriding the configuration file.
#[cfg(feature = "cli")]
#[derive(Clone, Debug, Default, clap::Args)]
pub struct ConfigArgs {
    /// Read the configuration from this TOML file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Port the webhook listens on
    #[arg(long)]
    pub port: Option<u16>,

    /// Log level
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Directory of the TLS certificate and key
    #[arg(long, value_name = "DIR")]
    pub tls_cert_dir: Option<PathBuf>,

    /// Base name of the TLS certificate and key files
    #[arg(long, value_name = "NAME")]
    pub tls_pair_name: Option<String>,

    /// Region of the registry and object storage
    #[arg(long)]
    pub region: Option<String>,

    /// Bucket holding the signature bundles
    #[arg(long)]
    pub bucket: Option<String>,

    /// PEM file with additional trust anchors
    #[arg(long, value_name = "PATH")]
    pub trust_anchors: Option<PathBuf>,
}

#[cfg(feature = "cli")]
impl ConfigArgs {
    /// Loads the configuration file if given and applies the overrides.
    pub fn into_config(mut self) -> Result<Config, ConfigError> {
        let mut config = match self.config.take() {
            Some(path) => Config::from_file(&path)?,
            None => Config::default(),
        };
        config.apply_args(self);
        Ok(config)
    }
}


//------------ ConfigError ---------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    Io(PathBuf, io::Error),

    /// The configuration file is not valid TOML.
    Toml(toml::de::Error),

    /// The named required value is empty.
    Invalid(&'static str),

    /// The log level is not known.
    LogLevel(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            ConfigError::Io(ref path, ref err) => {
                write!(f, "{}: {}", path.display(), err)
            }
            ConfigError::Toml(ref err) => err.fmt(f),
            ConfigError::Invalid(name) => write!(f, "invalid {}: empty", name),
            ConfigError::LogLevel(ref level) => {
                write!(f, "invalid log level: {:?}", level)
            }
        }
    }
}

impl error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            ConfigError::Io(_, ref err) => Some(err),
            ConfigError::Toml(ref err) => Some(err),
            ConfigError::Invalid(_) | ConfigError::LogLevel(_) => None,
        }
    }
}


//============ Tests =========================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.port, 443);
        assert_eq!(config.log_filter().unwrap(), log::LevelFilter::Debug);
        assert_eq!(
            config.cert_file(),
            Path::new("/var/run/manifest-sig/certs/tls.crt")
        );
        assert_eq!(
            config.key_file(),
            Path::new("/var/run/manifest-sig/certs/tls.key")
        );
    }

    #[test]
    fn parse_and_validate() {
        let config = Config::from_toml(
            "port = 8443\n\
             log_level = \"warn\"\n\
             tls_pair_name = \"webhook\"\n\
             region = \"eu-central-1\"\n\
             bucket = \"signatures\"\n\
             trust_anchors = \"/etc/manifest-sig/roots.pem\"\n"
        ).unwrap();
        config.validate().unwrap();
        assert_eq!(config.port, 8443);
        assert_eq!(config.log_filter().unwrap(), log::LevelFilter::Warn);
        assert_eq!(
            config.key_file(),
            Path::new("/var/run/manifest-sig/certs/webhook.key")
        );
        assert_eq!(
            config.trust_anchors.as_deref(),
            Some(Path::new("/etc/manifest-sig/roots.pem"))
        );
    }

    #[test]
    fn invalid_values() {
        let mut config = Config::default();
        assert_eq!(
            config.validate().unwrap_err().to_string(),
            "invalid region: empty"
        );
        config.region = "eu-central-1".into();
        assert_eq!(
            config.validate().unwrap_err().to_string(),
            "invalid bucket: empty"
        );
        config.log_level = "loud".into();
        assert!(config.log_filter().is_err());

        assert!(matches!(
            Config::from_toml("port = \"https\""),
            Err(ConfigError::Toml(_))
        ));
        assert!(Config::from_toml("unknown = 1").is_err());
    }

    #[cfg(feature = "cli")]
    #[test]
    fn command_line_overrides() {
        let mut config = Config::default();
        config.apply_args(ConfigArgs {
            region: Some("us-east-1".into()),
            bucket: Some("sigs".into()),
            port: Some(9443),
            .. Default::default()
        });
        config.validate().unwrap();
        assert_eq!(config.port, 9443);
        assert_eq!(config.log_level, "debug");
    }
}
