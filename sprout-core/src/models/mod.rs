pub mod plant;

pub use plant::{PlantDetails, PlantInfo};
