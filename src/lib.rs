//! Chainscan - Depth-Bounded Reconnaissance Propagation Engine
//!
//! This library drives network reconnaissance outward from user supplied targets.
//! Every scan result may spawn new targets one level deeper, chaining host discovery,
//! port and service enumeration, vulnerability assessment, exploitation and lateral
//! movement until the configured depth bound or an empty queue stops propagation.
//!
//! # Warning
//! This tool is designed for ethical penetration testing and security assessment
//! purposes only. Users are responsible for ensuring they have proper authorization
//! before scanning any networks or systems.

pub mod cli;
pub mod config;
pub mod graph;
pub mod modules;
pub mod result;
pub mod dispatch;
pub mod fallback;
pub mod events;
pub mod stats;
pub mod engine;
pub mod reporting;
pub mod display;
pub mod utils;
pub mod error;

pub use engine::{Engine, ProfileHandle, StopHandle};
pub use error::{Result, ScanError};
pub use result::ScanResult;

/// Common types and traits used throughout the application
pub mod types {
    use serde::{Deserialize, Serialize};
    use serde_json::Value;
    use std::collections::BTreeMap;
    use std::fmt;
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    use crate::result::ScanResult;

    pub type NodeId = Uuid;

    /// Closed set of node kinds the propagation table moves between.
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
    #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
    pub enum NodeType {
        InitialTarget,
        Subdomain,
        IpAddress,
        ActiveHost,
        OpenPorts,
        DomainScan,
        Service,
        VulnerabilityScan,
        Vulnerability,
        Exploitation,
        ExploitationSuccess,
        InternalScan,
        Custom,
    }

    impl NodeType {
        pub fn as_str(&self) -> &'static str {
            match self {
                NodeType::InitialTarget => "INITIAL_TARGET",
                NodeType::Subdomain => "SUBDOMAIN",
                NodeType::IpAddress => "IP_ADDRESS",
                NodeType::ActiveHost => "ACTIVE_HOST",
                NodeType::OpenPorts => "OPEN_PORTS",
                NodeType::DomainScan => "DOMAIN_SCAN",
                NodeType::Service => "SERVICE",
                NodeType::VulnerabilityScan => "VULNERABILITY_SCAN",
                NodeType::Vulnerability => "VULNERABILITY",
                NodeType::Exploitation => "EXPLOITATION",
                NodeType::ExploitationSuccess => "EXPLOITATION_SUCCESS",
                NodeType::InternalScan => "INTERNAL_SCAN",
                NodeType::Custom => "CUSTOM",
            }
        }
    }

    impl fmt::Display for NodeType {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.as_str())
        }
    }

    /// How an initial target string was classified.
    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "lowercase")]
    pub enum TargetKind {
        Ip,
        Domain,
        Hostname,
    }

    impl TargetKind {
        pub fn as_str(&self) -> &'static str {
            match self {
                TargetKind::Ip => "ip",
                TargetKind::Domain => "domain",
                TargetKind::Hostname => "hostname",
            }
        }
    }

    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
    #[serde(rename_all = "lowercase")]
    pub enum Protocol {
        #[default]
        Tcp,
        Udp,
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
    pub struct ServiceInfo {
        pub port: u16,
        #[serde(default)]
        pub protocol: Protocol,
        pub name: String,
        #[serde(default)]
        pub version: Option<String>,
        #[serde(default)]
        pub banner: Option<String>,
    }

    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
    #[serde(rename_all = "lowercase")]
    pub enum Severity {
        Critical,
        High,
        Medium,
        Low,
        #[default]
        Info,
    }

    impl Severity {
        pub fn as_str(&self) -> &'static str {
            match self {
                Severity::Critical => "critical",
                Severity::High => "high",
                Severity::Medium => "medium",
                Severity::Low => "low",
                Severity::Info => "info",
            }
        }
    }

    /// A single finding reported by a vulnerability scanner.
    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct VulnerabilityRecord {
        #[serde(rename = "type")]
        pub vuln_type: String,
        #[serde(default)]
        pub cve: Option<String>,
        #[serde(default)]
        pub description: String,
        #[serde(default)]
        pub severity: Severity,
        #[serde(default)]
        pub port: Option<u16>,
        #[serde(default)]
        pub service: Option<String>,
        #[serde(default)]
        pub exploit_available: Option<bool>,
    }

    /// Finding types that are worth an exploitation attempt even without an
    /// explicit `exploit_available` flag.
    pub const EXPLOITABLE_TYPES: &[&str] = &["anonymous_ftp", "exposed_endpoint", "weak_password"];

    impl VulnerabilityRecord {
        pub fn is_exploitable(&self) -> bool {
            self.exploit_available == Some(true)
                || EXPLOITABLE_TYPES.contains(&self.vuln_type.as_str())
        }
    }

    /// Access levels that open a path for lateral movement.
    pub const PIVOT_ACCESS_TYPES: &[&str] = &["ssh_access", "shell_access", "remote_code_execution"];

    /// Outcome of one exploitation attempt.
    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct ExploitAttempt {
        #[serde(default, alias = "vulnerability")]
        pub vulnerability_type: Option<String>,
        #[serde(default)]
        pub target: Option<String>,
        pub success: bool,
        #[serde(default)]
        pub access_type: Option<String>,
        #[serde(default)]
        pub details: Option<String>,
    }

    impl ExploitAttempt {
        pub fn grants_pivot(&self) -> bool {
            self.success
                && self
                    .access_type
                    .as_deref()
                    .map_or(false, |access| PIVOT_ACCESS_TYPES.contains(&access))
        }
    }

    /// A discovered entity or unit of scheduled work. Immutable once it enters the graph.
    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    pub struct ScanNode {
        pub id: NodeId,
        #[serde(rename = "type")]
        pub node_type: NodeType,
        pub data: String,
        pub source: Option<NodeId>,
        pub depth: u32,
        pub timestamp: DateTime<Utc>,
        pub module: Option<String>,
        #[serde(default)]
        pub metadata: BTreeMap<String, Value>,
        #[serde(default)]
        pub ports: Option<Vec<u16>>,
        #[serde(default)]
        pub services: Option<Vec<ServiceInfo>>,
        #[serde(default)]
        pub vulnerability_data: Option<VulnerabilityRecord>,
        #[serde(default)]
        pub vulnerabilities: Option<Vec<VulnerabilityRecord>>,
        #[serde(default)]
        pub exploit_data: Option<ExploitAttempt>,
    }

    impl ScanNode {
        fn blank(node_type: NodeType, data: String, source: Option<NodeId>, depth: u32) -> Self {
            Self {
                id: Uuid::new_v4(),
                node_type,
                data,
                source,
                depth,
                timestamp: Utc::now(),
                module: None,
                metadata: BTreeMap::new(),
                ports: None,
                services: None,
                vulnerability_data: None,
                vulnerabilities: None,
                exploit_data: None,
            }
        }

        /// Depth-0 node for a user supplied target.
        pub fn root(data: impl Into<String>, kind: TargetKind, module: impl Into<String>) -> Self {
            Self::blank(NodeType::InitialTarget, data.into(), None, 0)
                .with_module(module)
                .with_metadata("target_type", kind.as_str())
        }

        /// Successor of `parent`, one level deeper.
        pub fn child_of(parent: &ScanNode, node_type: NodeType, data: impl Into<String>) -> Self {
            Self::blank(node_type, data.into(), Some(parent.id), parent.depth + 1)
        }

        pub fn with_module(mut self, module: impl Into<String>) -> Self {
            self.module = Some(module.into());
            self
        }

        pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
            self.metadata.insert(key.into(), value.into());
            self
        }

        pub fn with_ports(mut self, ports: Vec<u16>) -> Self {
            self.ports = Some(ports);
            self
        }

        pub fn with_services(mut self, services: Vec<ServiceInfo>) -> Self {
            self.services = Some(services);
            self
        }

        pub fn with_vulnerability(mut self, finding: VulnerabilityRecord) -> Self {
            self.vulnerability_data = Some(finding);
            self
        }

        pub fn with_vulnerabilities(mut self, findings: Vec<VulnerabilityRecord>) -> Self {
            self.vulnerabilities = Some(findings);
            self
        }

        pub fn with_exploit(mut self, attempt: ExploitAttempt) -> Self {
            self.exploit_data = Some(attempt);
            self
        }

        pub fn target_kind(&self) -> Option<TargetKind> {
            match self.metadata.get("target_type").and_then(Value::as_str) {
                Some("ip") => Some(TargetKind::Ip),
                Some("domain") => Some(TargetKind::Domain),
                Some("hostname") => Some(TargetKind::Hostname),
                _ => None,
            }
        }
    }

    #[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
    #[serde(rename_all = "lowercase")]
    pub enum ScanStatus {
        Success,
        Failed,
    }

    /// Ledger entry recording how a node's execution ended.
    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct CompletedScan {
        pub status: ScanStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub result: Option<ScanResult>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub error: Option<String>,
        pub timestamp: DateTime<Utc>,
        pub module: String,
    }

    impl CompletedScan {
        pub fn success(module: impl Into<String>, result: ScanResult) -> Self {
            Self {
                status: ScanStatus::Success,
                result: Some(result),
                error: None,
                timestamp: Utc::now(),
                module: module.into(),
            }
        }

        pub fn failed(module: impl Into<String>, error: impl Into<String>) -> Self {
            Self {
                status: ScanStatus::Failed,
                result: None,
                error: Some(error.into()),
                timestamp: Utc::now(),
                module: module.into(),
            }
        }
    }
}
