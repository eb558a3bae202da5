//! Result interpretation: turn one module result into the next layer of nodes.
//!
//! The propagation table is a closed state machine. Each [`ScanResult`] variant maps
//! to a fixed set of successor node types and the module each of them runs next:
//!
//! | result                | spawns                                      | next module           |
//! |-----------------------|---------------------------------------------|-----------------------|
//! | subdomain_scanner     | SUBDOMAIN per subdomain                     | ping_scanner          |
//! | ping_scanner          | ACTIVE_HOST per host, DOMAIN_SCAN for domains | port_scanner / subdomain_scanner |
//! | port_scanner          | OPEN_PORTS per host with ports              | service_detector      |
//! | service_detector      | VULNERABILITY_SCAN and SERVICE per service  | vulnerability_scanner |
//! | vulnerability_scanner | VULNERABILITY per finding, EXPLOITATION     | report_generator / exploitation |
//! | exploitation          | EXPLOITATION_SUCCESS, INTERNAL_SCAN on pivot | report_generator / internal_scanner |
//! | internal_scanner      | ACTIVE_HOST per internal host               | port_scanner          |
//!
//! Every spawned node sits exactly one level below its source.

use crate::fallback::Fallback;
use crate::modules::names;
use crate::result::ScanResult;
use crate::types::{NodeType, ScanNode, Severity, TargetKind, VulnerabilityRecord};
use crate::utils::network;
use crate::{Result, ScanError};
use log::debug;
use std::net::IpAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Successor nodes and counter deltas produced by one dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Propagation {
    pub spawned: Vec<ScanNode>,
    pub vulnerabilities_found: u64,
    pub exploit_attempts: u64,
    pub exploit_successes: u64,
    pub lateral_movements: u64,
    pub simulated: bool,
}

impl Propagation {
    fn spawn(&mut self, node: ScanNode) {
        self.spawned.push(node);
    }

    pub fn count(&self, node_type: NodeType) -> usize {
        self.spawned.iter().filter(|node| node.node_type == node_type).count()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResultDispatcher;

impl ResultDispatcher {
    pub fn new() -> Self {
        Self
    }

    /// Apply the propagation table to `result` produced for `source`.
    ///
    /// An unrecognized result is replaced by the fallback's simulated result for the
    /// source. The replacement is dispatched once; a second unrecognized result ends
    /// propagation for this node. A panicking fallback is reported as a module error.
    pub fn dispatch(&self, result: &ScanResult, source: &ScanNode, fallback: &dyn Fallback) -> Result<Propagation> {
        debug!("Dispatching {} result for {}", result.module_name(), source.data);
        if matches!(result, ScanResult::Unrecognized) {
            debug!("Unrecognized result for {}, using fallback", source.id);
            let simulated = catch_unwind(AssertUnwindSafe(|| fallback.simulate(source)))
                .map_err(|_| ScanError::module(fallback.name(), "fallback panicked"))?;
            let mut propagation = self.propagate(&simulated, source);
            propagation.simulated = true;
            return Ok(propagation);
        }
        Ok(self.propagate(result, source))
    }

    /// Propagation without fallback substitution.
    pub fn propagate(&self, result: &ScanResult, source: &ScanNode) -> Propagation {
        let mut out = Propagation::default();

        match result {
            ScanResult::SubdomainScanner { subdomains } => {
                for subdomain in non_blank(subdomains) {
                    out.spawn(
                        ScanNode::child_of(source, NodeType::Subdomain, subdomain)
                            .with_module(names::PING_SCANNER)
                            .with_metadata("parent_domain", source.data.as_str()),
                    );
                }
            }

            ScanResult::PingScanner { active_hosts } => {
                for host in non_blank(active_hosts) {
                    out.spawn(
                        ScanNode::child_of(source, NodeType::ActiveHost, host)
                            .with_module(names::PORT_SCANNER),
                    );
                }

                if source.node_type == NodeType::InitialTarget
                    && source.target_kind() == Some(TargetKind::Domain)
                {
                    out.spawn(
                        ScanNode::child_of(source, NodeType::DomainScan, source.data.as_str())
                            .with_module(names::SUBDOMAIN_SCANNER),
                    );
                }
            }

            ScanResult::PortScanner { open_ports } => {
                for (host, ports) in open_ports.iter().filter(|(_, ports)| !ports.is_empty()) {
                    out.spawn(
                        ScanNode::child_of(source, NodeType::OpenPorts, host.as_str())
                            .with_module(names::SERVICE_DETECTOR)
                            .with_ports(ports.clone()),
                    );
                }
            }

            ScanResult::ServiceDetector { services } => {
                for (host, found) in services.iter().filter(|(_, found)| !found.is_empty()) {
                    out.spawn(
                        ScanNode::child_of(source, NodeType::VulnerabilityScan, host.as_str())
                            .with_module(names::VULNERABILITY_SCANNER)
                            .with_services(found.clone()),
                    );

                    for service in found {
                        out.spawn(
                            ScanNode::child_of(source, NodeType::Service, format!("{}:{}", host, service.port))
                                .with_module(names::VULNERABILITY_SCANNER)
                                .with_metadata("host", host.as_str())
                                .with_metadata("service", service.name.as_str())
                                .with_services(vec![service.clone()]),
                        );
                    }
                }
            }

            ScanResult::VulnerabilityScanner { vulnerabilities } => {
                out.vulnerabilities_found += vulnerabilities.len() as u64;

                for finding in vulnerabilities {
                    out.spawn(
                        ScanNode::child_of(source, NodeType::Vulnerability, source.data.as_str())
                            .with_module(names::REPORT_GENERATOR)
                            .with_metadata("severity", finding.severity.as_str())
                            .with_vulnerability(finding.clone()),
                    );
                }

                let exploitable: Vec<VulnerabilityRecord> = vulnerabilities
                    .iter()
                    .filter(|finding| finding.is_exploitable())
                    .cloned()
                    .collect();
                if !exploitable.is_empty() {
                    out.spawn(
                        ScanNode::child_of(source, NodeType::Exploitation, source.data.as_str())
                            .with_module(names::EXPLOITATION)
                            .with_vulnerabilities(exploitable),
                    );
                }
            }

            ScanResult::Exploitation { exploitation_results } => {
                out.exploit_attempts += exploitation_results.len() as u64;

                for attempt in exploitation_results.iter().filter(|attempt| attempt.success) {
                    out.exploit_successes += 1;
                    let host = attempt.target.clone().unwrap_or_else(|| source.data.clone());

                    out.spawn(
                        ScanNode::child_of(source, NodeType::ExploitationSuccess, host.as_str())
                            .with_module(names::REPORT_GENERATOR)
                            .with_metadata("severity", Severity::Critical.as_str())
                            .with_exploit(attempt.clone()),
                    );

                    if attempt.grants_pivot() {
                        out.lateral_movements += 1;
                        let access = attempt.access_type.clone().unwrap_or_default();
                        out.spawn(
                            ScanNode::child_of(source, NodeType::InternalScan, host.as_str())
                                .with_module(names::INTERNAL_SCANNER)
                                .with_metadata("access_type", access)
                                .with_exploit(attempt.clone()),
                        );
                    }
                }
            }

            ScanResult::InternalScanner { internal_hosts } => {
                for host in non_blank(internal_hosts) {
                    let private = host
                        .parse::<IpAddr>()
                        .map(|ip| network::is_private_ip(&ip))
                        .unwrap_or(false);
                    out.spawn(
                        ScanNode::child_of(source, NodeType::ActiveHost, host)
                            .with_module(names::PORT_SCANNER)
                            .with_metadata("internal", true)
                            .with_metadata("lateral_movement", true)
                            .with_metadata("private", private)
                            .with_metadata("pivot", source.data.as_str()),
                    );
                }
            }

            ScanResult::ReportGenerator { .. } | ScanResult::Unrecognized => {}
        }

        out
    }
}

fn non_blank(entries: &[String]) -> impl Iterator<Item = &str> {
    entries.iter().map(|entry| entry.trim()).filter(|entry| !entry.is_empty())
}
