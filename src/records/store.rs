//! Clinic record store
//!
//! The whole document lives in memory; mutations rewrite the JSON file in
//! place. Writes are best-effort: a failed save is logged and the in-memory
//! change is kept.

use chrono::{Datelike, Local};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::errors::{CareError, Result};
use crate::records::sample::sample_data;
use crate::records::types::*;

/// JSON-file-backed record store
#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    data: ClinicData,
    path: Option<PathBuf>,
}

impl RecordStore {
    /// Store that never touches disk
    pub fn in_memory(data: ClinicData) -> Self {
        Self { data, path: None }
    }

    /// Load from `path`; a missing or unreadable file yields an empty store
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = match Self::read(&path) {
            Ok(data) => {
                info!(path = %path.display(), patients = data.patients.len(), "loaded clinic records");
                data
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "clinic records unavailable, starting empty");
                ClinicData::default()
            }
        };
        Self { data, path: Some(path) }
    }

    /// Load from `path`, writing the bundled sample records first if the
    /// file does not exist yet
    pub fn load_or_seed(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.exists() {
            return Self::load(path);
        }

        let store = Self {
            data: sample_data(),
            path: Some(path),
        };
        store.persist();
        store
    }

    fn read(path: &Path) -> Result<ClinicData> {
        if !path.exists() {
            return Err(CareError::Records(format!("file not found: {}", path.display())));
        }
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Write the document to its file (no-op for in-memory stores)
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.data)?;
        fs::write(path, json)?;
        Ok(())
    }

    fn persist(&self) {
        if let Err(e) = self.save() {
            warn!(error = %e, "failed to save clinic records");
        }
    }

    pub fn data(&self) -> &ClinicData {
        &self.data
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// No patients and no doctors, typically a failed load
    pub fn is_empty(&self) -> bool {
        self.data.patients.is_empty() && self.data.doctors.is_empty()
    }

    // ── Patients ──────────────────────────────────────────────────────────

    pub fn patient(&self, patient_id: &str) -> Option<&Patient> {
        self.data.patients.iter().find(|p| p.id == patient_id)
    }

    /// Case-insensitive match on name or id
    pub fn search_patients(&self, query: &str) -> Vec<&Patient> {
        let query = query.to_lowercase();
        self.data
            .patients
            .iter()
            .filter(|p| p.name.to_lowercase().contains(&query) || p.id.to_lowercase().contains(&query))
            .collect()
    }

    pub fn medical_history(&self, patient_id: &str) -> &[MedicalCondition] {
        self.patient(patient_id)
            .map(|p| p.medical_history.as_slice())
            .unwrap_or(&[])
    }

    pub fn medications(&self, patient_id: &str) -> &[Medication] {
        self.patient(patient_id)
            .map(|p| p.medications.as_slice())
            .unwrap_or(&[])
    }

    pub fn allergies(&self, patient_id: &str) -> &[String] {
        self.patient(patient_id)
            .map(|p| p.allergies.as_slice())
            .unwrap_or(&[])
    }

    /// Append an entry to a patient's record; false if the patient is unknown
    pub fn add_medical_record_entry(&mut self, patient_id: &str, entry: RecordEntry) -> bool {
        let timestamp = Local::now().to_rfc3339();
        let Some(patient) = self.data.patients.iter_mut().find(|p| p.id == patient_id) else {
            warn!(patient_id, "patient not found for record entry");
            return false;
        };

        let kind = match entry {
            RecordEntry::Condition(mut condition) => {
                condition.timestamp = Some(timestamp);
                patient.medical_history.push(condition);
                "condition".to_string()
            }
            RecordEntry::Medication(mut medication) => {
                medication.timestamp = Some(timestamp);
                patient.medications.push(medication);
                "medication".to_string()
            }
            RecordEntry::Allergy(allergen) => {
                patient.allergies.push(allergen);
                "allergy".to_string()
            }
            RecordEntry::Other { kind, data } => {
                patient.additional_records.push(AdditionalRecord {
                    kind: kind.clone(),
                    data,
                    timestamp,
                });
                kind
            }
        };

        self.persist();
        info!(patient_id, kind = %kind, "added medical record entry");
        true
    }

    // ── Appointments ──────────────────────────────────────────────────────

    /// Appointments for a patient, ordered by date
    pub fn patient_appointments(&self, patient_id: &str) -> Vec<&Appointment> {
        let mut appointments: Vec<&Appointment> = self
            .data
            .appointments
            .iter()
            .filter(|a| a.patient_id == patient_id)
            .collect();
        appointments.sort_by(|a, b| a.date.cmp(&b.date));
        appointments
    }

    /// Store a new appointment and return its id (`appt-NNN`)
    pub fn add_appointment(&mut self, mut appointment: Appointment) -> String {
        let id = format!("appt-{:03}", self.data.appointments.len() + 1);
        appointment.id = id.clone();
        if appointment.status.is_empty() {
            appointment.status = "scheduled".to_string();
        }

        info!(appointment_id = %id, patient_id = %appointment.patient_id, "added appointment");
        self.data.appointments.push(appointment);
        self.persist();
        id
    }

    /// Book a consultation slot for a patient
    pub fn book_appointment(
        &mut self,
        patient_id: &str,
        doctor: &str,
        date: &str,
        time: &str,
        kind: &str,
    ) -> String {
        self.add_appointment(Appointment {
            id: String::new(),
            patient_id: patient_id.to_string(),
            doctor: doctor.to_string(),
            date: date.to_string(),
            time: time.to_string(),
            kind: kind.to_string(),
            status: "scheduled".to_string(),
        })
    }

    pub fn update_appointment_status(&mut self, appointment_id: &str, status: &str) -> bool {
        match self.data.appointments.iter_mut().find(|a| a.id == appointment_id) {
            Some(appointment) => {
                appointment.status = status.to_string();
                self.persist();
                info!(appointment_id, status, "updated appointment");
                true
            }
            None => {
                warn!(appointment_id, "appointment not found for update");
                false
            }
        }
    }

    pub fn cancel_appointment(&mut self, appointment_id: &str) -> bool {
        self.update_appointment_status(appointment_id, "cancelled")
    }

    // ── Doctors ───────────────────────────────────────────────────────────

    /// Doctors, optionally filtered by a case-insensitive specialty fragment
    pub fn available_doctors(&self, specialty: Option<&str>) -> Vec<&Doctor> {
        match specialty {
            Some(specialty) => {
                let specialty = specialty.to_lowercase();
                self.data
                    .doctors
                    .iter()
                    .filter(|d| d.specialty.to_lowercase().contains(&specialty))
                    .collect()
            }
            None => self.data.doctors.iter().collect(),
        }
    }

    /// Open slots for a doctor looked up by id or name
    pub fn doctor_availability(&self, doctor: &str) -> Vec<String> {
        self.data
            .doctors
            .iter()
            .find(|d| d.id == doctor || d.name == doctor)
            .map(Doctor::slots)
            .unwrap_or_default()
    }

    // ── FAQs ──────────────────────────────────────────────────────────────

    pub fn faqs(&self) -> &[Faq] {
        &self.data.faqs
    }

    /// Case-insensitive substring match on question or answer
    pub fn search_faqs(&self, query: &str) -> Vec<&Faq> {
        let query = query.to_lowercase();
        self.data
            .faqs
            .iter()
            .filter(|f| f.question.to_lowercase().contains(&query) || f.answer.to_lowercase().contains(&query))
            .collect()
    }

    pub fn emergency_keywords(&self) -> &[String] {
        &self.data.emergency_keywords
    }

    // ── FHIR export ───────────────────────────────────────────────────────

    /// Render a patient as a FHIR `Patient` resource
    pub fn to_fhir_patient(patient: &Patient) -> Value {
        let mut telecom = Vec::new();
        if let Some(phone) = &patient.contact.phone {
            telecom.push(json!({ "system": "phone", "value": phone, "use": "home" }));
        }
        if let Some(email) = &patient.contact.email {
            telecom.push(json!({ "system": "email", "value": email }));
        }

        json!({
            "resourceType": "Patient",
            "id": patient.id,
            "name": [{ "use": "official", "text": patient.name }],
            "gender": patient.gender,
            "birthDate": approximate_birth_date(patient.age),
            "telecom": telecom,
        })
    }
}

/// January 1st of the year the patient was born, if the age is known
fn approximate_birth_date(age: Option<u32>) -> Option<String> {
    let age = age.filter(|a| *a > 0)?;
    let year = Local::now().year() - age as i32;
    Some(format!("{}-01-01", year))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> RecordStore {
        RecordStore::in_memory(sample_data())
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = RecordStore::load(temp.path().join("missing.json"));
        assert!(store.data().patients.is_empty());
    }

    #[test]
    fn test_load_corrupt_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("records.json");
        fs::write(&path, "{ not json").unwrap();
        let store = RecordStore::load(&path);
        assert!(store.data().patients.is_empty());
    }

    #[test]
    fn test_seed_then_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("data").join("records.json");
        let seeded = RecordStore::load_or_seed(&path);
        assert!(path.exists());

        let reloaded = RecordStore::load(&path);
        assert_eq!(reloaded.data().patients.len(), seeded.data().patients.len());
    }

    #[test]
    fn test_patient_lookup_and_search() {
        let store = store();
        assert_eq!(store.patient("patient-001").unwrap().name, "John Smith");
        assert!(store.patient("nobody").is_none());
        assert_eq!(store.search_patients("SMITH").len(), 1);
        assert_eq!(store.search_patients("patient-00").len(), 3);
    }

    #[test]
    fn test_unknown_patient_sections_are_empty() {
        let store = store();
        assert!(store.medical_history("nobody").is_empty());
        assert!(store.medications("nobody").is_empty());
        assert!(store.allergies("nobody").is_empty());
    }

    #[test]
    fn test_appointments_sorted_by_date() {
        let mut store = store();
        store.book_appointment("patient-001", "Dr. Sarah Johnson", "2025-01-02", "09:00", "consultation");
        let appointments = store.patient_appointments("patient-001");
        assert!(appointments.len() >= 2);
        assert!(appointments.windows(2).all(|w| w[0].date <= w[1].date));
    }

    #[test]
    fn test_add_appointment_ids_and_status() {
        let mut store = RecordStore::in_memory(ClinicData::default());
        let first = store.add_appointment(Appointment {
            patient_id: "p1".to_string(),
            ..Appointment::default()
        });
        let second = store.book_appointment("p1", "Dr. Lee", "2025-09-01", "10:00", "consultation");
        assert_eq!(first, "appt-001");
        assert_eq!(second, "appt-002");
        assert_eq!(store.data().appointments[0].status, "scheduled");
    }

    #[test]
    fn test_cancel_appointment() {
        let mut store = store();
        let id = store.book_appointment("patient-002", "Dr. Lee", "2025-09-01", "10:00", "consultation");
        assert!(store.cancel_appointment(&id));
        let appt = store.data().appointments.iter().find(|a| a.id == id).unwrap();
        assert_eq!(appt.status, "cancelled");
        assert!(!store.cancel_appointment("appt-999"));
    }

    #[test]
    fn test_mutation_persists_to_disk() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("records.json");
        let mut store = RecordStore::load_or_seed(&path);
        let id = store.book_appointment("patient-003", "Dr. Lee", "2025-10-10", "14:00", "checkup");

        let reloaded = RecordStore::load(&path);
        assert!(reloaded.data().appointments.iter().any(|a| a.id == id));
    }

    #[test]
    fn test_doctor_filters() {
        let store = store();
        assert_eq!(store.available_doctors(Some("cardio")).len(), 1);
        assert!(store.available_doctors(Some("Neurosurgery")).is_empty());
        assert_eq!(store.available_doctors(None).len(), store.data().doctors.len());
    }

    #[test]
    fn test_doctor_availability_by_id_or_name() {
        let store = store();
        let by_id = store.doctor_availability("doc-001");
        let by_name = store.doctor_availability("Dr. Sarah Johnson");
        assert!(!by_id.is_empty());
        assert_eq!(by_id, by_name);
        assert!(store.doctor_availability("Dr. Nobody").is_empty());
    }

    #[test]
    fn test_add_record_entries() {
        let mut store = store();
        assert!(store.add_medical_record_entry("patient-002", RecordEntry::Allergy("Latex".to_string())));
        assert!(store.allergies("patient-002").contains(&"Latex".to_string()));

        assert!(store.add_medical_record_entry(
            "patient-002",
            RecordEntry::Medication(Medication {
                name: "Cetirizine".to_string(),
                dosage: "10mg".to_string(),
                frequency: "Once daily".to_string(),
                timestamp: None,
            })
        ));
        let meds = store.medications("patient-002");
        assert!(meds.last().unwrap().timestamp.is_some());

        assert!(store.add_medical_record_entry(
            "patient-002",
            RecordEntry::Other { kind: "vaccination".to_string(), data: json!({"vaccine": "Flu"}) }
        ));
        assert_eq!(store.patient("patient-002").unwrap().additional_records.len(), 1);

        assert!(!store.add_medical_record_entry("nobody", RecordEntry::Allergy("Dust".to_string())));
    }

    #[test]
    fn test_search_faqs() {
        let store = store();
        assert!(!store.search_faqs("PARKING").is_empty());
        assert!(store.search_faqs("zebra crossing").is_empty());
    }

    #[test]
    fn test_fhir_patient() {
        let store = store();
        let patient = store.patient("patient-001").unwrap();
        let fhir = RecordStore::to_fhir_patient(patient);
        assert_eq!(fhir["resourceType"], "Patient");
        assert_eq!(fhir["name"][0]["text"], "John Smith");
        assert!(fhir["birthDate"].as_str().unwrap().ends_with("-01-01"));
        assert_eq!(fhir["telecom"][0]["system"], "phone");
    }

    #[test]
    fn test_birth_date_unknown_age() {
        assert!(approximate_birth_date(None).is_none());
        assert!(approximate_birth_date(Some(0)).is_none());
    }
}
