/// Fixed instruction sent alongside every image. The schema here must match
/// [`crate::models::PlantInfo`].
pub const IDENTIFY_PROMPT: &str = "\
Please analyze this plant image and provide the following information in JSON format:
{
  name: string // common name
  scientificName: string
  description: string // detailed description
  careInstructions: string // comprehensive care guide
  details: {
    sunlight: string // light requirements
    watering: string // water needs
    temperature: string // ideal temperature range
    soil: string // soil preferences
    humidity: string // humidity requirements
    growthRate: string // slow/medium/fast
    maxHeight: string // maximum height
    toxicity: string // toxic to pets/humans?
  }
}
Return ONLY valid JSON without any additional text.";
