//! Randomised domain fixtures
//!
//! Names and contact details are random; enumerated values the vendor
//! validates strictly (gender, role, provider type, copay type, timezone)
//! are fixed. Identifying fields carry a suffix that is unique for the
//! lifetime of the process.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::types::{
    Address, AppointmentRequest, AvailabilityMode, AvailabilitySetting, DaySlot, Gender, License,
    PatientFixture, ProviderFixture, SlotSetting,
};

static PROCESS_SEQUENCE: AtomicU64 = AtomicU64::new(0);

const MALE_NAMES: &[&str] = &[
    "Samuel", "James", "Omar", "Daniel", "Lucas", "Mateo", "Henry", "Arjun", "Kenji", "Noah",
];
const FEMALE_NAMES: &[&str] = &[
    "Amara", "Sofia", "Grace", "Priya", "Elena", "Maya", "Chloe", "Aisha", "Hana", "Olivia",
];
const LAST_NAMES: &[&str] = &[
    "Peterson", "Okafor", "Nakamura", "Garcia", "Schmidt", "Patel", "Kowalski", "Haddad", "Reyes",
    "Lindqvist", "Mensah", "Dubois",
];
const CITIES: &[(&str, &str, &str)] = &[
    ("Albany", "NY", "12207"),
    ("Newark", "NJ", "07102"),
    ("Hartford", "CT", "06103"),
    ("Boston", "MA", "02108"),
];
const SPECIALITIES: &[&str] = &["Internal Medicine", "Family Medicine", "Pediatrics", "Cardiology"];
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Start and length of an appointment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppointmentWindow {
    pub start: DateTime<Utc>,
    pub minutes: u32,
}

impl AppointmentWindow {
    pub fn end(&self) -> DateTime<Utc> {
        self.start + Duration::minutes(self.minutes as i64)
    }
}

/// Generates domain fixtures for one workflow run
pub struct FixtureGenerator {
    rng: StdRng,
    seed: Option<u64>,
    sequence: u64,
    email_domain: String,
}

impl Default for FixtureGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureGenerator {
    /// Random fixtures, seeded from the OS
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            seed: None,
            sequence: 0,
            email_domain: "testworkflow.com".to_string(),
        }
    }

    /// Deterministic fixtures for a given seed
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed: Some(seed),
            sequence: 0,
            email_domain: "testworkflow.com".to_string(),
        }
    }

    /// Numeric serial behind every identifying field.
    ///
    /// Unseeded serials are `<millis><process sequence>`. Seeded serials are
    /// `<seed digits><generator sequence>`, so a seed reproduces its values
    /// and generators with different seeds do not collide.
    fn next_serial(&mut self) -> String {
        self.sequence += 1;
        match self.seed {
            Some(seed) => format!("{:06}{:04}", seed % 1_000_000, self.sequence % 10_000),
            None => {
                let seq = PROCESS_SEQUENCE.fetch_add(1, Ordering::Relaxed) % 10_000;
                format!("{}{:04}", Utc::now().timestamp_millis(), seq)
            }
        }
    }

    fn base36_tag(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| BASE36[self.rng.gen_range(0..BASE36.len())] as char)
            .collect()
    }

    fn digits(&mut self, len: usize) -> String {
        (0..len).map(|_| char::from(b'0' + self.rng.gen_range(0..10u8))).collect()
    }

    /// Trailing `len` digits of a serial, left-padded with random digits
    fn serial_digits(&mut self, serial: &str, len: usize) -> String {
        if serial.len() >= len {
            serial[serial.len() - len..].to_string()
        } else {
            format!("{}{}", self.digits(len - serial.len()), serial)
        }
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items.choose(&mut self.rng).copied().unwrap_or("Test")
    }

    fn name(&mut self) -> (Gender, String, String) {
        let gender = if self.rng.gen_bool(0.5) { Gender::Male } else { Gender::Female };
        let first = match gender {
            Gender::Male => self.pick(MALE_NAMES),
            Gender::Female => self.pick(FEMALE_NAMES),
        }
        .to_string();
        let last = self.pick(LAST_NAMES).to_string();
        (gender, first, last)
    }

    fn address(&mut self) -> Address {
        let (city, state, zip) = *CITIES.choose(&mut self.rng).unwrap_or(&CITIES[0]);
        Address {
            line1: format!("{} Main Street", self.rng.gen_range(1..999)),
            line2: String::new(),
            city: city.to_string(),
            state: state.to_string(),
            country: "USA".to_string(),
            zipcode: zip.to_string(),
        }
    }

    pub fn patient(&mut self) -> PatientFixture {
        let (gender, first_name, last_name) = self.name();
        let serial = self.next_serial();
        let tag = self.base36_tag(6);
        let email = format!(
            "{}.{}.{}{}@{}",
            first_name.to_lowercase(),
            last_name.to_lowercase(),
            serial,
            tag,
            self.email_domain
        );
        let mobile_number = format!("555{}", self.serial_digits(&serial, 7));
        let year = self.rng.gen_range(1950..2005);
        let month = self.rng.gen_range(1..=12);
        let day = self.rng.gen_range(1..=28);
        let birth_date = NaiveDate::from_ymd_opt(year, month, day)
            .unwrap_or(NaiveDate::MIN);

        PatientFixture {
            first_name,
            last_name,
            email,
            mobile_number,
            birth_date,
            gender,
            timezone: "EST".to_string(),
            address: self.address(),
            copay_type: "FIXED".to_string(),
        }
    }

    pub fn provider(&mut self) -> ProviderFixture {
        let (gender, first_name, _) = self.name();
        let serial = self.next_serial();
        let tag = self.base36_tag(6);
        let last_name = format!("Workflow{}", self.serial_digits(&serial, 8));
        let email = format!("provider_{}{}@{}", serial, tag, self.email_domain);
        let phone = format!("555{}", self.serial_digits(&serial, 7));
        let npi = self.serial_digits(&serial, 10);
        let license_number = format!("LIC{}", self.serial_digits(&serial, 8));

        let mut specialities: Vec<String> = SPECIALITIES
            .choose_multiple(&mut self.rng, 2)
            .map(|s| s.to_string())
            .collect();
        specialities.sort();

        let licensed_states = vec!["NY".to_string(), "NJ".to_string()];
        let licences = licensed_states
            .iter()
            .enumerate()
            .map(|(i, state)| License {
                license_state: state.clone(),
                license_number: format!("{}{}", license_number, i),
            })
            .collect();

        ProviderFixture {
            first_name,
            last_name,
            email,
            phone,
            npi,
            license_number,
            gender,
            role: "PROVIDER".to_string(),
            provider_type: "MD".to_string(),
            specialities,
            licensed_states,
            licences,
        }
    }

    /// Weekday schedule with NEW and FOLLOWUP visit types
    pub fn availability(&mut self, provider_id: &str) -> AvailabilitySetting {
        let weekday = |day: &str, end: &str| DaySlot {
            day: day.to_string(),
            start_time: "08:00:00".to_string(),
            end_time: end.to_string(),
            availability_mode: AvailabilityMode::Virtual,
        };

        AvailabilitySetting {
            provider_id: provider_id.to_string(),
            timezone: "EST".to_string(),
            booking_window: "60".to_string(),
            buffer_time: 15,
            initial_consult_time: 60,
            followup_consult_time: 30,
            set_to_weekdays: true,
            settings: vec![
                SlotSetting {
                    visit_type: "NEW".to_string(),
                    slot_time: 60,
                    min_notice_unit: "2_HOUR".to_string(),
                },
                SlotSetting {
                    visit_type: "FOLLOWUP".to_string(),
                    slot_time: 30,
                    min_notice_unit: "1_HOUR".to_string(),
                },
            ],
            block_days: Vec::new(),
            day_slots: vec![
                weekday("MONDAY", "18:00:00"),
                weekday("TUESDAY", "18:00:00"),
                weekday("WEDNESDAY", "18:00:00"),
                weekday("THURSDAY", "18:00:00"),
                weekday("FRIDAY", "17:00:00"),
            ],
        }
    }

    pub fn appointment(
        &mut self,
        patient_id: &str,
        provider_id: &str,
        window: AppointmentWindow,
    ) -> AppointmentRequest {
        let tag = self.base36_tag(4);
        AppointmentRequest {
            patient_id: patient_id.to_string(),
            provider_id: provider_id.to_string(),
            start_time: window.start,
            end_time: window.end(),
            mode: AvailabilityMode::Virtual,
            visit_type: "NEW".to_string(),
            payment_type: "CASH".to_string(),
            timezone: "EST".to_string(),
            duration: window.minutes,
            chief_complaint: format!("Automated workflow visit {}", tag),
        }
    }
}
