//! What runs when no module resolves for a node, or a module hands back a result the
//! dispatcher does not recognize. Propagation keeps moving on simulated findings
//! instead of halting at the first gap in the registry.

use crate::modules::{self, names};
use crate::result::ScanResult;
use crate::types::{ExploitAttempt, ScanNode, ServiceInfo, Severity, VulnerabilityRecord};
use crate::utils::network;
use fastrand::Rng;
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};

pub trait Fallback: Send + Sync {
    fn name(&self) -> &str {
        "fallback"
    }

    /// Produce a stand-in result for `node`. Must be deterministic for a given node payload.
    fn simulate(&self, node: &ScanNode) -> ScanResult;
}

/// Ends propagation at the node with an empty report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFallback;

impl Fallback for NoopFallback {
    fn name(&self) -> &str {
        "noop"
    }

    fn simulate(&self, node: &ScanNode) -> ScanResult {
        ScanResult::report(format!("no module available for {}", node.node_type))
    }
}

const SUBDOMAIN_PREFIXES: &[&str] = &["www", "mail", "api", "dev", "vpn", "staging", "portal", "admin"];
const SIMULATED_PORTS: &[u16] = &[21, 22, 23, 25, 53, 80, 139, 443, 445, 3306, 3389, 5432, 6379, 8080];

/// Simulates what the node's module would plausibly have returned, seeded from the
/// module name and node payload so reruns over the same targets give the same graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedFallback;

impl SimulatedFallback {
    pub fn new() -> Self {
        Self
    }

    fn rng_for(module: &str, data: &str) -> Rng {
        Rng::with_seed(fnv1a(module.as_bytes()) ^ fnv1a(data.as_bytes()).rotate_left(17))
    }

    fn subdomains(rng: &mut Rng, domain: &str) -> ScanResult {
        let count = rng.usize(1..=3);
        let mut prefixes = SUBDOMAIN_PREFIXES.to_vec();
        rng.shuffle(&mut prefixes);

        let mut subdomains: Vec<String> = prefixes
            .into_iter()
            .take(count)
            .map(|prefix| format!("{}.{}", prefix, domain))
            .collect();
        subdomains.sort();
        ScanResult::SubdomainScanner { subdomains }
    }

    fn ping(rng: &mut Rng, host: &str) -> ScanResult {
        let active_hosts = if rng.u8(0..10) < 8 {
            vec![host.to_string()]
        } else {
            Vec::new()
        };
        ScanResult::PingScanner { active_hosts }
    }

    fn ports(rng: &mut Rng, host: &str) -> ScanResult {
        let mut candidates = SIMULATED_PORTS.to_vec();
        rng.shuffle(&mut candidates);

        let mut ports: Vec<u16> = candidates.into_iter().take(rng.usize(1..=4)).collect();
        ports.sort_unstable();

        let mut open_ports = BTreeMap::new();
        open_ports.insert(host.to_string(), ports);
        ScanResult::PortScanner { open_ports }
    }

    fn services(node: &ScanNode) -> ScanResult {
        let found: Vec<ServiceInfo> = node
            .ports
            .iter()
            .flatten()
            .map(|&port| ServiceInfo {
                port,
                protocol: Default::default(),
                name: network::well_known_service(port).to_string(),
                version: None,
                banner: None,
            })
            .collect();

        let mut services = BTreeMap::new();
        if !found.is_empty() {
            services.insert(node.data.clone(), found);
        }
        ScanResult::ServiceDetector { services }
    }

    fn findings(rng: &mut Rng, node: &ScanNode) -> ScanResult {
        let vulnerabilities = node
            .services
            .iter()
            .flatten()
            .filter_map(|service| {
                let (vuln_type, severity, description) = match service.name.as_str() {
                    "ftp" => ("anonymous_ftp", Severity::Medium, "FTP server accepts anonymous login"),
                    "ssh" | "telnet" => ("weak_password", Severity::High, "Login accepts a common default password"),
                    "http" | "https" | "http-alt" => ("exposed_endpoint", Severity::Medium, "Administrative endpoint reachable without authentication"),
                    "mysql" | "postgresql" | "redis" | "mssql" => ("default_credentials", Severity::High, "Database accepts vendor default credentials"),
                    "microsoft-ds" | "netbios-ssn" => ("smb_signing_disabled", Severity::Medium, "SMB signing is not required"),
                    _ => return None,
                };
                if rng.bool() {
                    Some(VulnerabilityRecord {
                        vuln_type: vuln_type.to_string(),
                        cve: None,
                        description: description.to_string(),
                        severity,
                        port: Some(service.port),
                        service: Some(service.name.clone()),
                        exploit_available: None,
                    })
                } else {
                    None
                }
            })
            .collect();
        ScanResult::VulnerabilityScanner { vulnerabilities }
    }

    fn exploitation(rng: &mut Rng, node: &ScanNode) -> ScanResult {
        let exploitation_results = node
            .vulnerabilities
            .iter()
            .flatten()
            .map(|finding| {
                let success = rng.u8(0..3) == 0;
                let access_type = match finding.vuln_type.as_str() {
                    "weak_password" => "ssh_access",
                    "anonymous_ftp" => "file_access",
                    "exposed_endpoint" => "information_disclosure",
                    _ if finding.exploit_available == Some(true) => "remote_code_execution",
                    _ => "none",
                };
                ExploitAttempt {
                    vulnerability_type: Some(finding.vuln_type.clone()),
                    target: Some(node.data.clone()),
                    success,
                    access_type: success.then(|| access_type.to_string()),
                    details: Some("simulated attempt".to_string()),
                }
            })
            .collect();
        ScanResult::Exploitation { exploitation_results }
    }

    fn neighbours(rng: &mut Rng, host: &str) -> ScanResult {
        let internal_hosts = match host.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => {
                let [a, b, c, d] = ip.octets();
                let mut hosts: Vec<String> = (0..rng.usize(0..=2))
                    .map(|_| rng.u8(1..=254))
                    .filter(|&octet| octet != d)
                    .map(|octet| Ipv4Addr::new(a, b, c, octet).to_string())
                    .collect();
                hosts.sort();
                hosts.dedup();
                hosts
            }
            _ => Vec::new(),
        };
        ScanResult::InternalScanner { internal_hosts }
    }
}

impl Fallback for SimulatedFallback {
    fn name(&self) -> &str {
        "simulated"
    }

    fn simulate(&self, node: &ScanNode) -> ScanResult {
        let module = modules::module_name_for(node).unwrap_or_default();
        let mut rng = Self::rng_for(&module, &node.data);

        match module.as_str() {
            names::SUBDOMAIN_SCANNER => Self::subdomains(&mut rng, &node.data),
            names::PING_SCANNER => Self::ping(&mut rng, &node.data),
            names::PORT_SCANNER => Self::ports(&mut rng, &node.data),
            names::SERVICE_DETECTOR => Self::services(node),
            names::VULNERABILITY_SCANNER => Self::findings(&mut rng, node),
            names::EXPLOITATION => Self::exploitation(&mut rng, node),
            names::INTERNAL_SCANNER => Self::neighbours(&mut rng, &node.data),
            _ => ScanResult::report(format!("simulated report for {} {}", node.node_type, node.data)),
        }
    }
}

// Seeds must not change between processes or releases, which rules out std's randomly keyed SipHash.
fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, &byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}
