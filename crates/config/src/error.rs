#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("failed to open configuration file: {0}")]
    ConfigOpen(#[from] std::io::Error),
    #[error("failed to parse configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),
    #[error("invalid environment variable {name}: {reason}")]
    EnvVar { name: &'static str, reason: String },
}
