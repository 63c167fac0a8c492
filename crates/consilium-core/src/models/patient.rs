//! Patient and medical-record models.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// A patient referenced by consultation cases.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    /// Opaque UUID
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub middle_name: Option<String>,
    /// Date of birth (YYYY-MM-DD)
    pub date_of_birth: String,
    /// "M", "F", or "O"
    pub gender: String,
    /// Organization the patient is registered with
    pub organization: Option<String>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl Patient {
    /// Create a new patient with required fields.
    pub fn new(first_name: String, last_name: String, date_of_birth: String, gender: String) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            first_name,
            last_name,
            middle_name: None,
            date_of_birth,
            gender,
            organization: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// "Last First [Middle]" display form, also the name the knowledge base
    /// searches against.
    pub fn full_name(&self) -> String {
        let mut name = format!("{} {}", self.last_name, self.first_name);
        if let Some(middle) = &self.middle_name {
            if !middle.trim().is_empty() {
                name.push(' ');
                name.push_str(middle);
            }
        }
        name
    }

    /// Age in whole years on the given date; None when the stored
    /// date of birth does not parse.
    pub fn age_years(&self, on: NaiveDate) -> Option<i32> {
        let dob = NaiveDate::parse_from_str(self.date_of_birth.trim(), "%Y-%m-%d").ok()?;
        let mut age = on.year() - dob.year();
        if (on.month(), on.day()) < (dob.month(), dob.day()) {
            age -= 1;
        }
        Some(age)
    }
}

/// One visit entry in a patient's history. The knowledge base reads
/// comorbidities from the most recent record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MedicalRecord {
    /// Opaque UUID
    pub id: String,
    pub patient_id: String,
    /// Recording practitioner; None once that account is removed
    pub practitioner_id: Option<String>,
    pub diagnosis: Option<String>,
    /// Free text, comma-separated (e.g. "Hypertension, Diabetes")
    pub chronic_diseases: Option<String>,
    /// Visit date (YYYY-MM-DD)
    pub visit_date: String,
    /// Creation timestamp
    pub created_at: String,
}

impl MedicalRecord {
    /// Create a new record for a visit.
    pub fn new(patient_id: String, visit_date: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            patient_id,
            practitioner_id: None,
            diagnosis: None,
            chronic_diseases: None,
            visit_date,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Comorbidity list parsed from the chronic-diseases free text:
    /// comma-split, trimmed, empties dropped, capped at `cap` entries.
    pub fn comorbidities(&self, cap: usize) -> Vec<String> {
        match &self.chronic_diseases {
            Some(text) => text
                .split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .take(cap)
                .map(str::to_string)
                .collect(),
            None => Vec::new(),
        }
    }
}
