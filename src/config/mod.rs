pub mod defaults;
pub mod server;

use regex::Captures;
use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    env::{self, VarError},
    io::{self, Write},
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::Level;

pub trait Config: DeserializeOwned + Serialize {
    const DEFAULT_TOML: &'static str;
    const DEFAULT_FILE: &'static str;

    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    fn write_defaults(path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::File::create(path)?;
        file.write_all(Self::DEFAULT_TOML.as_bytes())?;
        Ok(())
    }

    /// Parses the TOML in `s`, after replacing every `${NAME}` with the value of the environment
    /// variable `NAME`.
    fn parse(s: &str) -> Result<Self, Error> {
        let s = substitute_env(s)?;
        let config: Self = toml::from_str(&s)?;
        config.validate().map_err(Error::Validation)?;

        Ok(config)
    }

    fn read(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    fn default_path() -> Result<PathBuf, Error> {
        Ok(xdg::BaseDirectories::with_prefix("dormsplit")?
            .get_config_home()
            .join(Self::DEFAULT_FILE))
    }
}

fn substitute_env(s: &str) -> Result<String, Error> {
    let re =
        Regex::new(r"\$\{([a-zA-Z_][a-zA-Z0-9_]*)\}").expect("placeholder pattern is valid");
    let mut missing = None;
    let substituted = re.replace_all(s, |caps: &Captures| match env::var(&caps[1]) {
        Ok(value) => value,
        Err(err) => {
            missing.get_or_insert_with(|| (caps[1].to_string(), err));
            String::new()
        }
    });
    match missing {
        Some((name, source)) => Err(Error::Env { name, source }),
        None => Ok(substituted.into_owned()),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    IO(#[from] io::Error),
    #[error("toml deserialize: {0}")]
    TomlDeserialize(#[from] toml::de::Error),
    #[error("toml serialize: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("environment variable {name} referenced from configuration: {source}")]
    Env {
        name: String,
        #[source]
        source: VarError,
    },
    #[error("xdg: {0}")]
    Xdg(#[from] xdg::BaseDirectoriesError),
    #[error("validation: {0}")]
    Validation(String),
}

pub fn init_logging(hide_timestamp: bool) {
    const LOG_ENV: &str = "DORMSPLIT_LOG";

    let env_filter = match env::var(LOG_ENV) {
        Ok(env) => env,
        Err(VarError::NotPresent) => "info".to_string(),
        Err(VarError::NotUnicode(_)) => panic!(
            "{} environment variable is not valid unicode and can't be read",
            LOG_ENV
        ),
    };
    let level = Level::from_str(&env_filter)
        .unwrap_or_else(|err| panic!("invalid `{}` environment variable {}", LOG_ENV, err));

    if hide_timestamp {
        tracing_subscriber::fmt()
            .with_max_level(level)
            .without_time()
            .init()
    } else {
        tracing_subscriber::fmt().with_max_level(level).init()
    };
}
