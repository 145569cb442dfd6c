use thiserror::Error;

/// Failures that stop a scene from being produced.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("Render surface unavailable: {0}")]
    Surface(String),
    #[error("Scene '{scene}' could not be built: {reason}")]
    Factory { scene: String, reason: String },
    #[error("No scene registered under '{0}'")]
    UnknownScene(String),
}

/// Failures reported at the asset ingestion boundary. None of these touch the scene.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to decode '{file}': {reason}")]
    Decode { file: String, reason: String },
    #[error("Scene closed before '{file}' finished loading")]
    SessionClosed { file: String },
    #[error("No active scene to receive '{file}'")]
    NoActiveScene { file: String },
}
