use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Gender;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    /// MRN — the patient's unique external identifier.
    pub medical_record_number: String,
    pub dob: NaiveDate,
    pub gender: Gender,
    pub blood_type: Option<String>,
}

impl Patient {
    pub fn new(name: &str, medical_record_number: &str, dob: NaiveDate, gender: Gender) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            medical_record_number: medical_record_number.to_string(),
            dob,
            gender,
            blood_type: None,
        }
    }

    /// Age in whole years on the given date. Never stored: derivable from dob.
    pub fn age_on(&self, date: NaiveDate) -> u32 {
        let mut age = date.year() - self.dob.year();
        if (date.month(), date.day()) < (self.dob.month(), self.dob.day()) {
            age -= 1;
        }
        age.max(0) as u32
    }

    pub fn age(&self) -> u32 {
        self.age_on(chrono::Utc::now().date_naive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_counts_whole_years() {
        let p = Patient::new(
            "Ada",
            "MRN-1",
            NaiveDate::from_ymd_opt(1990, 6, 15).unwrap(),
            Gender::Female,
        );
        assert_eq!(p.age_on(NaiveDate::from_ymd_opt(2020, 6, 14).unwrap()), 29);
        assert_eq!(p.age_on(NaiveDate::from_ymd_opt(2020, 6, 15).unwrap()), 30);
    }
}
