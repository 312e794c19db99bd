use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = AppError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum AppError {
    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("TOML Parsing Error: {0}")]
    TomlParse(String),

    #[error("Filesystem Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Target Directory Error: Path '{path}': {reason}")]
    TargetDir { path: PathBuf, reason: String },

    #[error("File Read Error: Path '{path}', Error: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File Write Error: Path '{path}', Error: {source}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory Creation Error: Path '{path}', Error: {source}")]
    DirCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Decode Error: Path '{path}' is not valid UTF-8")]
    Decode { path: PathBuf },

    #[error("WalkDir Error: {0}")]
    WalkDir(String),

    #[error("Ignore Error: {0}")]
    Ignore(#[from] ignore::Error),

    #[error("Invalid Argument: {0}")]
    InvalidArgument(String),

    #[error("Size Parsing Error: {0}")]
    SizeParse(String),
}
