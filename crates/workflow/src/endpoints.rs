//! Vendor endpoint paths, relative to the configured API prefix

pub const LOGIN: &str = "/login";
pub const PATIENT: &str = "/patient";
pub const PROVIDER: &str = "/provider";
pub const AVAILABILITY_SETTING: &str = "/provider/availability-setting";
pub const APPOINTMENT: &str = "/appointment";
pub const APPOINTMENT_STATUS: &str = "/appointment/update-status";
pub const ENCOUNTER_SUMMARY: &str = "/encounter-summary";

pub fn provider_availability(provider_id: &str) -> String {
    format!("/provider/{}/availability-setting", provider_id)
}

pub fn provider_slots(provider_id: &str, visit_type: &str) -> String {
    format!("/provider/{}/slots/{}", provider_id, visit_type)
}

pub fn telehealth_token(appointment_id: &str) -> String {
    format!("/token/{}", appointment_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths() {
        assert_eq!(provider_slots("p1", "NEW"), "/provider/p1/slots/NEW");
        assert_eq!(provider_availability("p1"), "/provider/p1/availability-setting");
        assert_eq!(telehealth_token("a9"), "/token/a9");
    }
}
