//! Domain records exchanged with the scheduling API

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gender values accepted by the vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gender::Male => write!(f, "MALE"),
            Gender::Female => write!(f, "FEMALE"),
        }
    }
}

/// Appointment lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    CheckedIn,
    InExam,
    Completed,
    Cancelled,
    NoShow,
}

impl std::fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AppointmentStatus::Scheduled => "SCHEDULED",
            AppointmentStatus::Confirmed => "CONFIRMED",
            AppointmentStatus::CheckedIn => "CHECKED_IN",
            AppointmentStatus::InExam => "IN_EXAM",
            AppointmentStatus::Completed => "COMPLETED",
            AppointmentStatus::Cancelled => "CANCELLED",
            AppointmentStatus::NoShow => "NO_SHOW",
        };
        write!(f, "{}", s)
    }
}

/// Visit mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AvailabilityMode {
    #[default]
    Virtual,
    InPerson,
}

impl std::fmt::Display for AvailabilityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AvailabilityMode::Virtual => write!(f, "VIRTUAL"),
            AvailabilityMode::InPerson => write!(f, "IN_PERSON"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub line1: String,
    pub line2: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zipcode: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientFixture {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile_number: String,
    pub birth_date: NaiveDate,
    pub gender: Gender,
    pub timezone: String,
    pub address: Address,
    pub copay_type: String,
}

impl PatientFixture {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Request body for `POST /patient`
    pub fn to_payload(&self) -> Value {
        serde_json::json!({
            "phoneNotAvailable": false,
            "emailNotAvailable": false,
            "registrationDate": "",
            "firstName": self.first_name,
            "middleName": "",
            "lastName": self.last_name,
            "timezone": self.timezone,
            "birthDate": format!("{}T00:00:00.000Z", self.birth_date.format("%Y-%m-%d")),
            "gender": self.gender,
            "ssn": "",
            "mrn": "",
            "languages": null,
            "avatar": "",
            "email": self.email,
            "mobileNumber": self.mobile_number,
            "faxNumber": "",
            "homePhone": "",
            "address": self.address,
            "emergencyContacts": [{ "firstName": "", "lastName": "", "mobile": "" }],
            "patientInsurances": [{
                "active": true,
                "insuranceId": "",
                "copayType": self.copay_type,
                "coInsurance": "",
                "claimNumber": "",
                "note": "",
                "deductibleAmount": "",
                "employerName": "",
                "groupId": "",
                "memberId": "",
                "groupName": "",
                "insurancePayer": {}
            }],
            "emailConsent": false,
            "messageConsent": false,
            "callConsent": false,
            "patientConsentEntities": [{ "signedDate": Utc::now().to_rfc3339() }]
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct License {
    pub license_state: String,
    pub license_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderFixture {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub npi: String,
    pub license_number: String,
    pub gender: Gender,
    pub role: String,
    pub provider_type: String,
    pub specialities: Vec<String>,
    pub licensed_states: Vec<String>,
    pub licences: Vec<License>,
}

impl ProviderFixture {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Request body for `POST /provider`
    pub fn to_payload(&self) -> Value {
        serde_json::json!({
            "roleType": self.role,
            "active": true,
            "admin_access": false,
            "status": true,
            "avatar": "",
            "role": self.role,
            "providerType": self.provider_type,
            "firstName": self.first_name,
            "lastName": self.last_name,
            "gender": self.gender,
            "phone": self.phone,
            "npi": self.npi,
            "specialities": self.specialities,
            "licensedStates": self.licensed_states,
            "licenseNumber": self.license_number,
            "email": self.email,
            "licenceInformation": self.licences.iter().map(|l| serde_json::json!({
                "uuid": "",
                "licenseState": l.license_state,
                "licenseNumber": l.license_number,
            })).collect::<Vec<_>>(),
            "deaInformation": []
        })
    }
}

/// Per-visit-type slot configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotSetting {
    #[serde(rename = "type")]
    pub visit_type: String,
    pub slot_time: u32,
    pub min_notice_unit: String,
}

/// Weekly working window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySlot {
    pub day: String,
    pub start_time: String,
    pub end_time: String,
    pub availability_mode: AvailabilityMode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilitySetting {
    pub provider_id: String,
    pub timezone: String,
    pub booking_window: String,
    pub buffer_time: u32,
    pub initial_consult_time: u32,
    pub followup_consult_time: u32,
    pub set_to_weekdays: bool,
    pub settings: Vec<SlotSetting>,
    pub block_days: Vec<String>,
    pub day_slots: Vec<DaySlot>,
}

impl AvailabilitySetting {
    /// Request body for `POST /provider/availability-setting`
    pub fn to_payload(&self, tenant_id: &str) -> Value {
        let mut payload = serde_json::to_value(self).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut payload {
            map.insert("xTENANTID".into(), Value::String(tenant_id.to_string()));
        }
        payload
    }
}

/// A bookable interval reported by the slot query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub duration: Option<u32>,
    #[serde(default)]
    pub availability_mode: Option<AvailabilityMode>,
}

impl Slot {
    pub fn duration_minutes(&self) -> i64 {
        match self.duration {
            Some(d) => d as i64,
            None => (self.end_time - self.start_time).num_minutes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRequest {
    pub patient_id: String,
    pub provider_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub mode: AvailabilityMode,
    #[serde(rename = "type")]
    pub visit_type: String,
    pub payment_type: String,
    pub timezone: String,
    pub duration: u32,
    pub chief_complaint: String,
}

impl AppointmentRequest {
    /// Request body for `POST /appointment`
    pub fn to_payload(&self, tenant_id: &str) -> Value {
        serde_json::json!({
            "mode": self.mode,
            "patientId": self.patient_id,
            "customForms": null,
            "visit_type": "",
            "type": self.visit_type,
            "paymentType": self.payment_type,
            "providerId": self.provider_id,
            "startTime": self.start_time.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            "endTime": self.end_time.to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            "insurance_type": "",
            "note": "",
            "authorization": "",
            "forms": [],
            "chiefComplaint": self.chief_complaint,
            "isRecurring": false,
            "reminder_set": false,
            "timezone": self.timezone,
            "duration": self.duration,
            "xTENANTID": tenant_id
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_parses_vendor_shape() {
        let slot: Slot = serde_json::from_value(serde_json::json!({
            "startTime": "2026-10-20T14:00:00Z",
            "endTime": "2026-10-20T15:00:00Z",
            "duration": 60,
            "availabilityMode": "VIRTUAL"
        }))
        .unwrap();
        assert_eq!(slot.duration_minutes(), 60);
        assert_eq!(slot.availability_mode, Some(AvailabilityMode::Virtual));
    }

    #[test]
    fn test_slot_duration_falls_back_to_interval() {
        let slot: Slot = serde_json::from_value(serde_json::json!({
            "startTime": "2026-10-20T14:00:00Z",
            "endTime": "2026-10-20T14:30:00Z"
        }))
        .unwrap();
        assert_eq!(slot.duration_minutes(), 30);
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_value(AppointmentStatus::CheckedIn).unwrap(),
            serde_json::json!("CHECKED_IN")
        );
        assert_eq!(AppointmentStatus::NoShow.to_string(), "NO_SHOW");
    }
}
