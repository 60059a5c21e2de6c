use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormtraceError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Config Error: {0}")]
    Config(String),
}

pub type FtResult<T> = Result<T, FormtraceError>;
