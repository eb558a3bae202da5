use crate::{Result, ScanError};
use crate::config::{ConfigProvider, OutputFormat, ReportingConfig};
use crate::engine::Engine;
use crate::stats::Statistics;
use crate::types::{CompletedScan, NodeId, NodeType, ScanNode, ScanStatus, Severity};
use chrono::Utc;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Point-in-time export of an engine: counters, every node, and the completed-scan ledger.
/// Field order is fixed by declaration and maps are ordered, so two exports of the same
/// state diff cleanly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub statistics: Statistics,
    pub discovered_nodes: Vec<ScanNode>,
    pub completed_scans: BTreeMap<NodeId, CompletedScan>,
}

impl ExportDocument {
    pub fn capture<C: ConfigProvider>(engine: &Engine<C>) -> Self {
        Self {
            statistics: engine.statistics().clone(),
            discovered_nodes: engine.graph().nodes().to_vec(),
            completed_scans: engine.ledger().clone(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).await
            .map_err(|e| ScanError::Export(format!("Failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    pub async fn write_json(&self, path: &Path) -> Result<()> {
        debug!("Writing JSON export: {}", path.display());
        let json_data = self.to_json()?;
        write_file(path, json_data.into_bytes()).await
    }

    /// One row per node with its ledger outcome.
    pub async fn write_csv(&self, path: &Path) -> Result<()> {
        debug!("Writing CSV export: {}", path.display());

        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record([
            "id", "type", "data", "source", "depth", "timestamp", "module", "status", "error",
        ])?;

        for node in &self.discovered_nodes {
            let completed = self.completed_scans.get(&node.id);
            let status = match completed.map(|scan| scan.status) {
                Some(ScanStatus::Success) => "success",
                Some(ScanStatus::Failed) => "failed",
                None => "pending",
            };
            writer.write_record([
                node.id.to_string(),
                node.node_type.to_string(),
                node.data.clone(),
                node.source.map(|source| source.to_string()).unwrap_or_default(),
                node.depth.to_string(),
                node.timestamp.to_rfc3339(),
                node.module.clone().unwrap_or_default(),
                status.to_string(),
                completed.and_then(|scan| scan.error.clone()).unwrap_or_default(),
            ])?;
        }

        let bytes = writer.into_inner()
            .map_err(|e| ScanError::Export(format!("Failed to flush CSV export: {}", e)))?;
        write_file(path, bytes).await
    }

    pub fn summary(&self) -> ExportSummary {
        ExportSummary::from_document(self)
    }
}

async fn write_file(path: &Path, contents: Vec<u8>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await
            .map_err(|e| ScanError::Export(format!("Failed to create {}: {}", parent.display(), e)))?;
    }

    fs::write(path, contents).await
        .map_err(|e| ScanError::Export(format!("Failed to write {}: {}", path.display(), e)))
}

/// Writes timestamped exports of an engine in every configured format.
pub struct ReportGenerator {
    config: ReportingConfig,
}

impl ReportGenerator {
    pub fn new(config: ReportingConfig) -> Self {
        Self { config }
    }

    pub async fn generate_report<C: ConfigProvider>(&self, engine: &Engine<C>) -> Result<Vec<PathBuf>> {
        let mut generated_files = Vec::new();

        let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
        let base_filename = format!("chainscan_report_{}", timestamp);

        for format in &self.config.formats {
            let extension = match format {
                OutputFormat::Json => "json",
                OutputFormat::Csv => "csv",
            };
            let path = self.config.output_dir.join(format!("{}.{}", base_filename, extension));
            generated_files.push(engine.export_as(&path, *format).await?);
        }

        info!("Generated {} report files", generated_files.len());
        Ok(generated_files)
    }
}

/// Condensed view of an export for terminal output.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ExportSummary {
    pub node_count: usize,
    pub nodes_by_type: BTreeMap<NodeType, usize>,
    pub critical_vulnerabilities: usize,
    pub high_vulnerabilities: usize,
    pub medium_vulnerabilities: usize,
    pub low_vulnerabilities: usize,
    pub compromised_hosts: usize,
    pub failed_scans: usize,
}

impl ExportSummary {
    fn from_document(document: &ExportDocument) -> Self {
        let mut summary = ExportSummary {
            node_count: document.discovered_nodes.len(),
            ..Default::default()
        };

        for node in &document.discovered_nodes {
            *summary.nodes_by_type.entry(node.node_type).or_insert(0) += 1;

            if let Some(finding) = &node.vulnerability_data {
                match finding.severity {
                    Severity::Critical => summary.critical_vulnerabilities += 1,
                    Severity::High => summary.high_vulnerabilities += 1,
                    Severity::Medium => summary.medium_vulnerabilities += 1,
                    Severity::Low => summary.low_vulnerabilities += 1,
                    Severity::Info => {}
                }
            }
            if node.node_type == NodeType::ExploitationSuccess {
                summary.compromised_hosts += 1;
            }
        }

        summary.failed_scans = document
            .completed_scans
            .values()
            .filter(|scan| scan.status == ScanStatus::Failed)
            .count();
        summary
    }
}
