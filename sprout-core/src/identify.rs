use std::sync::Arc;

use thiserror::Error;

use crate::encoder::ImagePayload;
use crate::gemini::{GeminiError, IdentificationBackend};
use crate::models::PlantInfo;
use crate::parser::{parse_plant_info, ParseError};

/// Shown for every parse or shape failure.
pub const PARSE_FAILURE_MESSAGE: &str = "Failed to parse plant information from API response";

#[derive(Error, Debug)]
pub enum IdentifyError {
    #[error("{0}")]
    Transport(#[from] GeminiError),

    #[error("Failed to parse plant information from API response: {0}")]
    Parse(#[from] ParseError),
}

impl IdentifyError {
    /// The single line shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            IdentifyError::Transport(e) => format!("Error: {}", e),
            IdentifyError::Parse(_) => format!("Error: {}", PARSE_FAILURE_MESSAGE),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            IdentifyError::Transport(_) => "transport",
            IdentifyError::Parse(e) => e.kind(),
        }
    }
}

/// Remote call plus parse.
#[derive(Clone)]
pub struct Identifier {
    backend: Arc<dyn IdentificationBackend>,
}

impl Identifier {
    pub fn new(backend: Arc<dyn IdentificationBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub async fn identify(&self, payload: &ImagePayload) -> Result<PlantInfo, IdentifyError> {
        let text = self.backend.generate(payload).await?;
        match parse_plant_info(&text) {
            Ok(info) => Ok(info),
            Err(e) => {
                tracing::warn!(
                    backend = self.backend.name(),
                    error = %e,
                    response_len = text.len(),
                    "Model response could not be parsed"
                );
                Err(e.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::{GeminiClient, GeminiConfig};
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MONSTERA: &str = r#"{"name":"Monstera","scientificName":"Monstera deliciosa","description":"...","careInstructions":"...","details":{"sunlight":"Bright indirect","watering":"Weekly","temperature":"18-27C","soil":"Well-drained","humidity":"High","growthRate":"Fast","maxHeight":"3m","toxicity":"Toxic to pets"}}"#;

    fn identifier(mock_server: &MockServer) -> Identifier {
        let client = GeminiClient::new(GeminiConfig {
            api_key: "test-api-key".to_string(),
            model: "gemini-2.0-flash".to_string(),
            base_url: mock_server.uri(),
            timeout_seconds: 5,
        })
        .expect("Failed to create client");
        Identifier::new(Arc::new(client))
    }

    fn payload() -> ImagePayload {
        crate::encoder::encode_image(b"leaf.jpg bytes", Some("image/jpeg")).payload
    }

    async fn mount_text(mock_server: &MockServer, text: &str) {
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{ "content": { "parts": [{ "text": text }] } }]
            })))
            .mount(mock_server)
            .await;
    }

    #[tokio::test]
    async fn test_identify_returns_plant_info() {
        let mock_server = MockServer::start().await;
        mount_text(&mock_server, MONSTERA).await;

        let info = identifier(&mock_server).identify(&payload()).await.unwrap();
        assert_eq!(info.name, "Monstera");
        assert_eq!(info.details.toxicity, "Toxic to pets");
    }

    #[tokio::test]
    async fn test_identify_twice_gives_same_result() {
        let mock_server = MockServer::start().await;
        mount_text(&mock_server, MONSTERA).await;
        let identifier = identifier(&mock_server);

        let first = identifier.identify(&payload()).await.unwrap();
        let second = identifier.identify(&payload()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_identify_not_json_is_parse_error() {
        let mock_server = MockServer::start().await;
        mount_text(&mock_server, "not json").await;

        let err = identifier(&mock_server).identify(&payload()).await.unwrap_err();
        assert!(matches!(err, IdentifyError::Parse(ParseError::Malformed(_))));
        assert_eq!(err.kind(), "parse");
        assert_eq!(
            err.user_message(),
            "Error: Failed to parse plant information from API response"
        );
    }

    #[tokio::test]
    async fn test_identify_partial_json_is_shape_error() {
        let mock_server = MockServer::start().await;
        mount_text(&mock_server, r#"{"name":"Monstera"}"#).await;

        let err = identifier(&mock_server).identify(&payload()).await.unwrap_err();
        assert_eq!(err.kind(), "shape");
        assert!(err.user_message().contains(PARSE_FAILURE_MESSAGE));
    }

    #[tokio::test]
    async fn test_identify_service_failure_is_transport_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": { "code": 503, "message": "The model is overloaded" }
            })))
            .mount(&mock_server)
            .await;

        let err = identifier(&mock_server).identify(&payload()).await.unwrap_err();
        assert_eq!(err.kind(), "transport");
        assert_eq!(
            err.user_message(),
            "Error: API error (503): The model is overloaded"
        );
    }
}
