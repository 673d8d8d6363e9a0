//! Synthetic patient records.
//!
//! Records are generated from the request key: the key seeds the RNG, so a
//! given key always produces the same record. The data is plausible enough to
//! exercise serialization and payload sizes, nothing more.

use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::Serialize;

const FIRST_NAMES: &[&str] = &[
    "James", "Mary", "John", "Patricia", "Robert", "Jennifer", "Michael", "Linda", "William",
    "Elizabeth", "David", "Barbara", "Richard", "Susan", "Joseph", "Jessica", "Thomas", "Sarah",
];

const LAST_NAMES: &[&str] = &[
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Garcia", "Miller", "Davis", "Rodriguez",
    "Martinez", "Hernandez", "Lopez", "Wilson", "Anderson", "Thomas", "Taylor", "Moore", "Jackson",
];

// ICD-10, simplified.
const DIAGNOSIS_CODES: &[&str] = &[
    "E11.9", "I10", "J44.9", "E78.5", "M54.5", "F41.9", "K21.9", "J45.909",
];

const MEDICATIONS: &[&str] = &[
    "Metformin 500mg",
    "Lisinopril 10mg",
    "Atorvastatin 20mg",
    "Omeprazole 20mg",
    "Albuterol inhaler",
    "Levothyroxine 75mcg",
    "Amlodipine 5mg",
    "Gabapentin 300mg",
    "Sertraline 50mg",
];

const ALLERGIES: &[&str] = &[
    "Penicillin",
    "Sulfa drugs",
    "Aspirin",
    "Iodine",
    "Latex",
    "Shellfish",
    "No known allergies",
];

const PHYSICIANS: &[&str] = &[
    "Dr. Anderson",
    "Dr. Patel",
    "Dr. Chen",
    "Dr. Williams",
    "Dr. Johnson",
    "Dr. Rodriguez",
    "Dr. Kim",
    "Dr. Thompson",
];

const INSURANCE_PROVIDERS: &[&str] = &[
    "Blue Cross Blue Shield",
    "UnitedHealthcare",
    "Aetna",
    "Cigna",
    "Humana",
    "Kaiser Permanente",
    "Medicare",
    "Medicaid",
];

const BLOOD_TYPES: &[&str] = &["A+", "A-", "B+", "B-", "AB+", "AB-", "O+", "O-"];

/// Reference year for generated dates.
const CURRENT_YEAR: u16 = 2025;

/// A patient record as returned by the upstream source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub id: String,
    pub medical_record_number: String,
    pub first_name: String,
    pub last_name: String,
    /// `YYYY-MM-DD`.
    pub date_of_birth: String,
    pub gender: String,
    pub diagnosis_codes: Vec<String>,
    pub medications: Vec<String>,
    pub allergies: Vec<String>,
    /// `YYYY-MM-DD`.
    pub last_visit_date: String,
    pub primary_physician: String,
    pub insurance_provider: String,
    pub blood_type: String,
}

impl Record {
    /// Generates the record for `id`. Deterministic per `id`.
    pub fn generate(id: &str) -> Self {
        let mut rng = StdRng::seed_from_u64(seed_for(id));

        let age = rng.random_range(18..90);
        let date_of_birth = format_date(
            CURRENT_YEAR - age,
            rng.random_range(1..=12),
            rng.random_range(1..=28),
        );

        let diagnosis_codes = pick_many(&mut rng, DIAGNOSIS_CODES, 1..=3);
        let medications = pick_many(&mut rng, MEDICATIONS, 0..=4);
        // Everyone has at least one entry, even if it is "No known allergies".
        let allergies = pick_many(&mut rng, ALLERGIES, 1..=2);

        let last_visit_date = format_date(
            CURRENT_YEAR - rng.random_range(0..=1),
            rng.random_range(1..=12),
            rng.random_range(1..=28),
        );

        let gender = if rng.random_bool(0.5) { "Female" } else { "Male" };

        Self {
            id: id.to_string(),
            medical_record_number: format!("MRN-{:07}", rng.random_range(0..9_999_999)),
            first_name: pick(&mut rng, FIRST_NAMES).to_string(),
            last_name: pick(&mut rng, LAST_NAMES).to_string(),
            date_of_birth,
            gender: gender.to_string(),
            diagnosis_codes,
            medications,
            allergies,
            last_visit_date,
            primary_physician: pick(&mut rng, PHYSICIANS).to_string(),
            insurance_provider: pick(&mut rng, INSURANCE_PROVIDERS).to_string(),
            blood_type: pick(&mut rng, BLOOD_TYPES).to_string(),
        }
    }

    /// Basic integrity checks.
    ///
    /// # Errors
    ///
    /// Returns a description of the first failed check.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.id.is_empty() {
            return Err("patient ID is required");
        }
        if self.first_name.is_empty() || self.last_name.is_empty() {
            return Err("patient name is required");
        }
        Ok(())
    }
}

/// 31-multiplier string hash, stable across runs and platforms.
fn seed_for(id: &str) -> u64 {
    id.chars()
        .fold(0_u64, |h, c| h.wrapping_mul(31).wrapping_add(u64::from(c)))
}

fn pick<'a>(rng: &mut StdRng, items: &[&'a str]) -> &'a str {
    items[rng.random_range(0..items.len())]
}

fn pick_many(
    rng: &mut StdRng,
    items: &[&str],
    count: core::ops::RangeInclusive<usize>,
) -> Vec<String> {
    let n = rng.random_range(count);
    (0..n).map(|_| pick(rng, items).to_string()).collect()
}

fn format_date(year: u16, month: u8, day: u8) -> String {
    format!("{year:04}-{month:02}-{day:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_is_deterministic_per_key() {
        assert_eq!(Record::generate("P00042"), Record::generate("P00042"));
        assert_ne!(
            Record::generate("P00042").medical_record_number,
            Record::generate("P00043").medical_record_number
        );
    }

    #[test]
    fn generated_fields_are_within_bounds() {
        for i in 0..200 {
            let record = Record::generate(&format!("P{i:05}"));
            assert!(record.validate().is_ok());
            assert!((1..=3).contains(&record.diagnosis_codes.len()));
            assert!(record.medications.len() <= 4);
            assert!((1..=2).contains(&record.allergies.len()));
            assert_eq!(record.date_of_birth.len(), 10);
            assert!(record.medical_record_number.starts_with("MRN-"));
            assert!(BLOOD_TYPES.contains(&record.blood_type.as_str()));
        }
    }

    #[test]
    fn validate_requires_id_and_name() {
        let mut record = Record::generate("P1");
        record.first_name.clear();
        assert_eq!(record.validate(), Err("patient name is required"));
        record.id.clear();
        assert_eq!(record.validate(), Err("patient ID is required"));
    }
}
