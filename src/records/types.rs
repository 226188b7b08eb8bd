//! Record types stored in the clinic JSON document
//!
//! Field names follow the on-disk JSON; every collection defaults to empty
//! so partially filled documents still load.

use serde::{Deserialize, Serialize};

/// Default slots offered when a doctor has none listed
pub const DEFAULT_SLOTS: &[&str] = &["09:00", "10:00", "11:00", "14:00", "15:00", "16:00"];

/// Whole record document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicData {
    pub patients: Vec<Patient>,
    pub appointments: Vec<Appointment>,
    pub doctors: Vec<Doctor>,
    pub faqs: Vec<Faq>,
    pub emergency_keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Patient {
    pub id: String,
    pub name: String,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub allergies: Vec<String>,
    pub medications: Vec<Medication>,
    pub medical_history: Vec<MedicalCondition>,
    pub contact: Contact,
    pub emergency_contact: Option<EmergencyContact>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub additional_records: Vec<AdditionalRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Medication {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MedicalCondition {
    pub condition: String,
    pub diagnosed: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Contact {
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EmergencyContact {
    pub name: String,
    pub phone: String,
}

/// Record of a kind the store has no dedicated section for
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdditionalRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: serde_json::Value,
    pub timestamp: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub doctor: String,
    pub date: String,
    pub time: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Doctor {
    pub id: String,
    pub name: String,
    pub specialty: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_slots: Option<Vec<String>>,
}

impl Doctor {
    /// Listed slots, or the clinic default day
    pub fn slots(&self) -> Vec<String> {
        match &self.available_slots {
            Some(slots) => slots.clone(),
            None => DEFAULT_SLOTS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Faq {
    pub question: String,
    pub answer: String,
}

/// New entry for a patient's record
#[derive(Debug, Clone, PartialEq)]
pub enum RecordEntry {
    Condition(MedicalCondition),
    Medication(Medication),
    Allergy(String),
    Other { kind: String, data: serde_json::Value },
}
