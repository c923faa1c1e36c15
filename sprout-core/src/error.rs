use thiserror::Error;

#[derive(Error, Debug)]
pub enum SproutError {
    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Gemini client error: {0}")]
    Gemini(#[from] crate::gemini::GeminiError),
}
