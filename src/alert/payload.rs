//! Alert payload handed to every handler.

use std::net::IpAddr;

use chrono::{DateTime, Local, SecondsFormat};
use serde::{Deserialize, Serialize};

/// The JSON document a handler receives: exactly `hostname`, `ip` and `time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub hostname: String,
    pub ip: String,
    pub time: String,
}

impl AlertPayload {
    /// Build a payload for `offender` seen at `time`.
    ///
    /// IPv4-mapped IPv6 addresses are reported as plain IPv4.
    pub fn new(hostname: impl Into<String>, offender: IpAddr, time: DateTime<Local>) -> Self {
        Self {
            hostname: hostname.into(),
            ip: offender.to_canonical().to_string(),
            time: time.to_rfc3339_opts(SecondsFormat::Micros, false),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Human-readable alert line for chat webhooks.
    pub fn summary(&self) -> String {
        format!(
            "Honeypot alert!\nHost: {}\nAttacker IP: {}\nTime: {}",
            self.hostname, self.ip, self.time
        )
    }
}

/// Name of this host as reported in alerts.
pub fn local_hostname() -> String {
    whoami::fallible::hostname().unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn serializes_exactly_three_fields() {
        let time = Local.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let payload = AlertPayload::new("decoy-01", IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7)), time);

        let value: serde_json::Value = serde_json::from_str(&payload.to_json().unwrap()).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 3);
        assert_eq!(object["hostname"], "decoy-01");
        assert_eq!(object["ip"], "203.0.113.7");
        assert!(object["time"].as_str().unwrap().starts_with("2024-03-01T12:30:00"));
    }

    #[test]
    fn mapped_ipv6_reported_as_ipv4() {
        let mapped = IpAddr::V6(Ipv4Addr::new(198, 51, 100, 2).to_ipv6_mapped());
        let payload = AlertPayload::new("h", mapped, Local::now());
        assert_eq!(payload.ip, "198.51.100.2");

        let payload = AlertPayload::new("h", IpAddr::V6(Ipv6Addr::LOCALHOST), Local::now());
        assert_eq!(payload.ip, "::1");
    }

    #[test]
    fn summary_lists_host_ip_and_time() {
        let payload = AlertPayload {
            hostname: "decoy-01".into(),
            ip: "203.0.113.7".into(),
            time: "2024-03-01T12:30:00.000000+00:00".into(),
        };
        assert_eq!(
            payload.summary(),
            "Honeypot alert!\nHost: decoy-01\nAttacker IP: 203.0.113.7\nTime: 2024-03-01T12:30:00.000000+00:00"
        );
    }
}
