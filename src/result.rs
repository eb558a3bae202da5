use crate::modules::names;
use crate::types::{ExploitAttempt, ServiceInfo, VulnerabilityRecord};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a scan module hands back, tagged by the `module` field.
///
/// Every module kind has its own variant so the dispatcher can match exhaustively
/// instead of probing which keys a loose map happens to contain. Any tag that is not
/// one of the known modules deserializes to [`ScanResult::Unrecognized`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "module", rename_all = "snake_case")]
pub enum ScanResult {
    SubdomainScanner {
        #[serde(default)]
        subdomains: Vec<String>,
    },
    PingScanner {
        #[serde(default)]
        active_hosts: Vec<String>,
    },
    PortScanner {
        #[serde(default)]
        open_ports: BTreeMap<String, Vec<u16>>,
    },
    ServiceDetector {
        #[serde(default)]
        services: BTreeMap<String, Vec<ServiceInfo>>,
    },
    VulnerabilityScanner {
        #[serde(default)]
        vulnerabilities: Vec<VulnerabilityRecord>,
    },
    Exploitation {
        #[serde(default)]
        exploitation_results: Vec<ExploitAttempt>,
    },
    InternalScanner {
        #[serde(default)]
        internal_hosts: Vec<String>,
    },
    ReportGenerator {
        #[serde(default)]
        summary: Option<String>,
    },
    #[serde(other)]
    Unrecognized,
}

impl ScanResult {
    /// Parse a raw JSON document produced by a module.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn module_name(&self) -> &'static str {
        match self {
            ScanResult::SubdomainScanner { .. } => names::SUBDOMAIN_SCANNER,
            ScanResult::PingScanner { .. } => names::PING_SCANNER,
            ScanResult::PortScanner { .. } => names::PORT_SCANNER,
            ScanResult::ServiceDetector { .. } => names::SERVICE_DETECTOR,
            ScanResult::VulnerabilityScanner { .. } => names::VULNERABILITY_SCANNER,
            ScanResult::Exploitation { .. } => names::EXPLOITATION,
            ScanResult::InternalScanner { .. } => names::INTERNAL_SCANNER,
            ScanResult::ReportGenerator { .. } => names::REPORT_GENERATOR,
            ScanResult::Unrecognized => "unrecognized",
        }
    }

    pub fn report(summary: impl Into<String>) -> Self {
        ScanResult::ReportGenerator {
            summary: Some(summary.into()),
        }
    }
}
