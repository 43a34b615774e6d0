use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read run input at {path}: {source}")]
    InputFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse run input: {0}")]
    InputFileParse(#[from] serde_yaml::Error),

    #[error("invalid run input: {0}")]
    Validation(String),

    #[error("run input resolves to no targets; provide targetUrls or searchTerms")]
    NoTargets,
}
