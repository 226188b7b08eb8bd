//! Clinic records: patients, appointments, doctors and FAQs
//!
//! Stored as one FHIR-flavoured JSON document.

pub mod sample;
pub mod store;
pub mod types;

pub use sample::sample_data;
pub use store::RecordStore;
pub use types::{
    Appointment, ClinicData, Contact, Doctor, EmergencyContact, Faq, MedicalCondition, Medication,
    Patient, RecordEntry,
};
