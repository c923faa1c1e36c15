pub mod api;
pub mod config;
pub mod encoder;
pub mod error;
pub mod gemini;
pub mod identify;
pub mod models;
pub mod parser;
pub mod prompt;
pub mod session;

pub use api::SproutResponse;
pub use config::SproutConfig;
pub use encoder::{encode_file, encode_image, EncodeError, EncodedImage, ImagePayload};
pub use error::SproutError;
pub use gemini::{GeminiClient, GeminiConfig, GeminiError, IdentificationBackend};
pub use identify::{IdentifyError, Identifier};
pub use models::{PlantDetails, PlantInfo};
pub use parser::{parse_plant_info, ParseError};
pub use session::{
    Analysis, AnalyzeError, IdentificationSession, InFlightPolicy, SessionSnapshot, SessionState,
};
