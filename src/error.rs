use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Duplicate task: {0}")]
    DuplicateTask(String),

    #[error("Task {task} depends on unknown task: {dependency}")]
    UnknownDependency { task: String, dependency: String },

    #[error("Dependency cycle detected among tasks: {}", .tasks.join(", "))]
    CycleDetected { tasks: Vec<String> },

    #[error("Task not found in task set: {0}")]
    TaskNotFound(String),

    #[error("Provider binary not found: {0}")]
    ProviderBinaryNotFound(String),

    #[error("Task join error: {0}")]
    TaskJoin(String),
}

pub type Result<T> = std::result::Result<T, Error>;
