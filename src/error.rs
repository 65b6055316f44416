use serde::Serialize;

/// Crate-wide error type. Setup and I/O paths return `Result<T, AppError>`.
/// Serializes as `{ error, kind }` so it can be embedded in the JSON run report.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Workbook archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("Script error: {0}")]
    Script(#[from] crate::script::ScriptError),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// Short machine-readable discriminator used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Io(_) => "io",
            AppError::Json(_) => "json",
            AppError::Yaml(_) => "yaml",
            AppError::Toml(_) => "toml",
            AppError::Zip(_) => "zip",
            AppError::Config(_) => "config",
            AppError::Workbook(_) => "workbook",
            AppError::Script(_) => "script",
            AppError::Transport(_) => "transport",
            AppError::Internal(_) => "internal",
        }
    }
}

/// We serialize as `{ error: "...", kind: "..." }` for report consumers.
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("AppError", 2)?;
        s.serialize_field("error", &self.to_string())?;
        s.serialize_field("kind", self.kind())?;
        s.end()
    }
}
