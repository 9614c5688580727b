use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Specialist {
    pub id: Uuid,
    pub name: String,
    pub specialty: String,
    pub hospital: Option<String>,
    /// Patient rating, 0.0 to 5.0.
    pub rating: f64,
    pub success_rate: Option<f64>,
    pub languages: Vec<String>,
    pub insurance: Vec<String>,
    pub consultation_fee: f64,
}

impl Specialist {
    pub fn new(name: &str, specialty: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            specialty: specialty.to_string(),
            hospital: None,
            rating: 0.0,
            success_rate: None,
            languages: Vec::new(),
            insurance: Vec::new(),
            consultation_fee: 0.0,
        }
    }

    pub fn rating_valid(&self) -> bool {
        (0.0..=5.0).contains(&self.rating)
    }
}
