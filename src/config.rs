use std::{
    env, fmt,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    str::FromStr,
};

use thiserror::Error;

const DEFAULT_PORT: u16 = 5050;
const DEFAULT_BODY_LIMIT_MB: usize = 5;
const DEFAULT_DATASET_DIR: &str = "dataset";
const DEFAULT_MODEL_PATH: &str = "food_model.pb";
const DEFAULT_TEMP_DIR: &str = "temp";
const DEFAULT_INPUT_OP: &str = "x";
const DEFAULT_OUTPUT_OP: &str = "Identity";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Memory layout the model expects for its input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorLayout {
    #[default]
    Nchw,
    Nhwc,
}

impl FromStr for TensorLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nchw" => Ok(TensorLayout::Nchw),
            "nhwc" => Ok(TensorLayout::Nhwc),
            other => Err(format!("expected `nchw` or `nhwc`, got `{other}`")),
        }
    }
}

impl fmt::Display for TensorLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TensorLayout::Nchw => f.write_str("nchw"),
            TensorLayout::Nhwc => f.write_str("nhwc"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub body_limit_bytes: usize,
    pub dataset_dir: PathBuf,
    pub model_path: PathBuf,
    pub model_url: Option<String>,
    pub temp_dir: PathBuf,
    pub input_op: String,
    pub output_op: String,
    pub input_layout: TensorLayout,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source. Unset variables
    /// fall back to their defaults, malformed ones are rejected.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = parse_or(&lookup, "HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?;
        let port = parse_or(&lookup, "PORT", DEFAULT_PORT)?;

        let body_limit_mb: usize = parse_or(&lookup, "BODY_LIMIT_MB", DEFAULT_BODY_LIMIT_MB)?;
        let body_limit_bytes = body_limit_mb.checked_mul(1024 * 1024).ok_or_else(|| {
            ConfigError::Invalid {
                name: "BODY_LIMIT_MB",
                value: body_limit_mb.to_string(),
                reason: "value is too large".into(),
            }
        })?;

        let input_layout = parse_or(&lookup, "MODEL_INPUT_LAYOUT", TensorLayout::default())?;

        Ok(Config {
            host,
            port,
            body_limit_bytes,
            dataset_dir: lookup("DATASET_DIR")
                .unwrap_or_else(|| DEFAULT_DATASET_DIR.into())
                .into(),
            model_path: lookup("MODEL_PATH")
                .unwrap_or_else(|| DEFAULT_MODEL_PATH.into())
                .into(),
            model_url: lookup("MODEL_URL").filter(|url| !url.trim().is_empty()),
            temp_dir: lookup("TEMP_DIR")
                .unwrap_or_else(|| DEFAULT_TEMP_DIR.into())
                .into(),
            input_op: lookup("MODEL_INPUT_OP").unwrap_or_else(|| DEFAULT_INPUT_OP.into()),
            output_op: lookup("MODEL_OUTPUT_OP").unwrap_or_else(|| DEFAULT_OUTPUT_OP.into()),
            input_layout,
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
            name,
            reason: err.to_string(),
            value,
        }),
    }
}
