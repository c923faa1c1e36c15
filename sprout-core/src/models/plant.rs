use serde::{Deserialize, Serialize};

/// Identification and care record returned by the remote model.
///
/// Every field is required when deserializing; a response missing any of
/// them is rejected rather than rendered partially. Unknown fields are
/// ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantInfo {
    pub name: String,
    pub scientific_name: String,
    pub description: String,
    pub care_instructions: String,
    pub details: PlantDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlantDetails {
    pub sunlight: String,
    pub watering: String,
    pub temperature: String,
    pub soil: String,
    pub humidity: String,
    pub growth_rate: String,
    pub max_height: String,
    pub toxicity: String,
}

impl PlantDetails {
    /// The headline requirements, shown as cards.
    pub fn cards(&self) -> [(&'static str, &str); 4] {
        [
            ("Sunlight", self.sunlight.as_str()),
            ("Watering", self.watering.as_str()),
            ("Temperature", self.temperature.as_str()),
            ("Soil", self.soil.as_str()),
        ]
    }

    /// The remaining characteristics, shown as table rows.
    pub fn table_rows(&self) -> [(&'static str, &str); 4] {
        [
            ("Humidity", self.humidity.as_str()),
            ("Growth Rate", self.growth_rate.as_str()),
            ("Max Height", self.max_height.as_str()),
            ("Toxicity", self.toxicity.as_str()),
        ]
    }
}
