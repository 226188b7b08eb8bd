//! Demo clinic records written on first run

use crate::records::types::*;

fn text(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn medication(name: &str, dosage: &str, frequency: &str) -> Medication {
    Medication {
        name: name.to_string(),
        dosage: dosage.to_string(),
        frequency: frequency.to_string(),
        timestamp: None,
    }
}

fn condition(name: &str, diagnosed: &str, status: &str) -> MedicalCondition {
    MedicalCondition {
        condition: name.to_string(),
        diagnosed: diagnosed.to_string(),
        status: status.to_string(),
        timestamp: None,
    }
}

fn appointment(id: &str, patient_id: &str, doctor: &str, date: &str, time: &str, kind: &str) -> Appointment {
    Appointment {
        id: id.to_string(),
        patient_id: patient_id.to_string(),
        doctor: doctor.to_string(),
        date: date.to_string(),
        time: time.to_string(),
        kind: kind.to_string(),
        status: "scheduled".to_string(),
    }
}

fn faq(question: &str, answer: &str) -> Faq {
    Faq {
        question: question.to_string(),
        answer: answer.to_string(),
    }
}

/// Three patients, three doctors, a few appointments and the clinic FAQ
pub fn sample_data() -> ClinicData {
    let patients = vec![
        Patient {
            id: "patient-001".to_string(),
            name: "John Smith".to_string(),
            age: Some(45),
            gender: Some("male".to_string()),
            allergies: text(&["Penicillin", "Shellfish"]),
            medications: vec![
                medication("Lisinopril", "10mg", "Once daily"),
                medication("Metformin", "500mg", "Twice daily"),
                medication("Atorvastatin", "20mg", "Once daily at bedtime"),
            ],
            medical_history: vec![
                condition("Hypertension", "2019-03-15", "Active"),
                condition("Type 2 Diabetes", "2020-07-22", "Active"),
            ],
            contact: Contact {
                phone: Some("555-0101".to_string()),
                email: Some("john.smith@example.com".to_string()),
            },
            emergency_contact: Some(EmergencyContact {
                name: "Mary Smith".to_string(),
                phone: "555-0102".to_string(),
            }),
            additional_records: Vec::new(),
        },
        Patient {
            id: "patient-002".to_string(),
            name: "Emily Davis".to_string(),
            age: Some(32),
            gender: Some("female".to_string()),
            allergies: Vec::new(),
            medications: vec![medication("Albuterol inhaler", "90mcg", "As needed")],
            medical_history: vec![condition("Asthma", "2008-05-10", "Controlled")],
            contact: Contact {
                phone: Some("555-0201".to_string()),
                email: Some("emily.davis@example.com".to_string()),
            },
            emergency_contact: Some(EmergencyContact {
                name: "Robert Davis".to_string(),
                phone: "555-0202".to_string(),
            }),
            additional_records: Vec::new(),
        },
        Patient {
            id: "patient-003".to_string(),
            name: "Carlos Rivera".to_string(),
            age: Some(67),
            gender: Some("male".to_string()),
            allergies: text(&["Sulfa drugs"]),
            medications: vec![
                medication("Warfarin", "5mg", "Once daily"),
                medication("Metoprolol", "25mg", "Twice daily"),
            ],
            medical_history: vec![
                condition("Atrial Fibrillation", "2017-11-02", "Active"),
                condition("Knee Replacement", "2015-06-18", "Resolved"),
            ],
            contact: Contact {
                phone: Some("555-0301".to_string()),
                email: None,
            },
            emergency_contact: None,
            additional_records: Vec::new(),
        },
    ];

    let doctors = vec![
        Doctor {
            id: "doc-001".to_string(),
            name: "Dr. Sarah Johnson".to_string(),
            specialty: "Cardiology".to_string(),
            available_slots: Some(text(&["09:00", "10:30", "14:00", "15:30"])),
        },
        Doctor {
            id: "doc-002".to_string(),
            name: "Dr. Michael Chen".to_string(),
            specialty: "Internal Medicine".to_string(),
            available_slots: Some(text(&["08:30", "11:00", "13:00", "16:00"])),
        },
        Doctor {
            id: "doc-003".to_string(),
            name: "Dr. Aisha Patel".to_string(),
            specialty: "Dermatology".to_string(),
            available_slots: None,
        },
    ];

    let appointments = vec![
        appointment("appt-001", "patient-001", "Dr. Sarah Johnson", "2025-09-12", "10:30", "Follow-up"),
        appointment("appt-002", "patient-003", "Dr. Michael Chen", "2025-08-28", "11:00", "Annual physical"),
    ];

    let faqs = vec![
        faq(
            "What are your office hours?",
            "We are open Monday to Friday 8:00 AM to 6:00 PM, and Saturday 9:00 AM to 2:00 PM. We are closed on Sundays.",
        ),
        faq(
            "Do you accept my insurance?",
            "We accept most major insurance plans including Blue Cross, Aetna, Cigna and Medicare. Please call to verify your specific plan.",
        ),
        faq(
            "How do I request a prescription refill?",
            "Request refills through the patient portal or ask your pharmacy to send us a request. Allow 48 hours for processing.",
        ),
        faq(
            "How long do lab results take?",
            "Most lab results are available within 3 to 5 business days and are posted to the patient portal.",
        ),
        faq(
            "Where can I park?",
            "Free parking is available in the garage next to the main entrance. Bring your ticket to reception for validation.",
        ),
    ];

    ClinicData {
        patients,
        appointments,
        doctors,
        faqs,
        emergency_keywords: text(&["chest pain", "can't breathe", "unconscious", "severe bleeding"]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_ids_unique() {
        let data = sample_data();
        let mut ids: Vec<&str> = data.patients.iter().map(|p| p.id.as_str()).collect();
        ids.dedup();
        assert_eq!(ids.len(), data.patients.len());
        assert!(data.appointments.iter().all(|a| a.id.starts_with("appt-")));
    }
}
