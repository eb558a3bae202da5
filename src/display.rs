use crate::events::EngineEvent;
use crate::reporting::ExportSummary;
use crate::stats::Snapshot;
use crate::types::{NodeType, ScanNode, Severity};
use colored::*;

/// Colored terminal output for the engine's event stream and final summary
pub struct DisplayManager {
    use_colors: bool,
    quiet_mode: bool,
}

impl DisplayManager {
    pub fn new() -> Self {
        Self::with_quiet(false)
    }

    pub fn with_quiet(quiet: bool) -> Self {
        let use_colors = std::env::var("NO_COLOR").is_err() &&
                        std::env::var("TERM").map_or(true, |term| term != "dumb");

        Self {
            use_colors,
            quiet_mode: quiet,
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet_mode
    }

    /// Print one engine event. Progress ticks and bookkeeping events are skipped.
    pub fn print_event(&self, event: &EngineEvent) {
        if self.quiet_mode { return; }

        match event {
            EngineEvent::NodeAdded { node } => {
                self.print_info(&format!("Target {} ({})", node.data, node.module.as_deref().unwrap_or("-")));
            }
            EngineEvent::NodeDiscovered { node } => self.print_node(node),
            EngineEvent::TaskFailed { module, error, .. } => {
                self.print_warning(&format!("{} failed: {}", module, error));
            }
            EngineEvent::ScanStarted { pending, max_depth, max_concurrent_tasks } => {
                self.print_info(&format!(
                    "Propagating from {} targets (depth {}, {} concurrent tasks)",
                    pending, max_depth, max_concurrent_tasks
                ));
            }
            EngineEvent::EngineStopped { pending } => {
                self.print_warning(&format!("Stopped with {} nodes still queued", pending));
            }
            EngineEvent::ProfileChanged { name, profile } => {
                self.print_info(&format!("Profile {}: {}", name, profile.description));
            }
            EngineEvent::ResultsExported { path, nodes } => {
                self.print_success(&format!("Exported {} nodes to {}", nodes, path.display()));
            }
            _ => {}
        }
    }

    /// Print a discovered node, indented by depth
    pub fn print_node(&self, node: &ScanNode) {
        if self.quiet_mode { return; }

        let indent = "  ".repeat(node.depth as usize);
        let icon = self.get_node_icon(node.node_type);

        if self.use_colors {
            let kind = node.node_type.as_str().color(self.get_node_color(node)).bold();
            let detail = self.node_detail(node)
                .map(|detail| format!(" {}", detail.bright_black()))
                .unwrap_or_default();
            println!("  {}{} {} {}{}", indent, icon, kind, node.data.bright_white(), detail);
        } else {
            let detail = self.node_detail(node).map(|detail| format!(" {}", detail)).unwrap_or_default();
            println!("  {}[{}] {}{}", indent, node.node_type, node.data, detail);
        }
    }

    fn node_detail(&self, node: &ScanNode) -> Option<String> {
        if let Some(finding) = &node.vulnerability_data {
            return Some(format!("({}, {})", finding.vuln_type, finding.severity.as_str()));
        }
        if let Some(attempt) = &node.exploit_data {
            return attempt.access_type.as_ref().map(|access| format!("({})", access));
        }
        node.ports.as_ref().map(|ports| {
            let list: Vec<String> = ports.iter().map(|port| port.to_string()).collect();
            format!("[{}]", list.join(", "))
        })
    }

    /// Print the closing statistics table
    pub fn print_summary(&self, snapshot: &Snapshot, summary: &ExportSummary) {
        if self.quiet_mode { return; }

        let stats = &snapshot.statistics;
        println!();
        self.print_section_header("PROPAGATION SUMMARY");

        let rows = [
            ("Profile", snapshot.active_profile.clone()),
            ("Nodes", snapshot.total_nodes.to_string()),
            ("Pruned", snapshot.pruned.to_string()),
            ("Scans", format!("{} ({} failed)", stats.total_scans, stats.failed_scans)),
            ("Success rate", format!("{:.1}%", stats.success_rate() * 100.0)),
            ("Modules executed", stats.modules_executed.to_string()),
            ("Vulnerabilities", stats.vulnerabilities_found.to_string()),
            ("Exploits", format!("{}/{}", stats.exploit_successes, stats.exploit_attempts)),
            ("Lateral movements", stats.lateral_movements.to_string()),
        ];

        for (label, value) in rows {
            if self.use_colors {
                println!("  {:<18} {}", label.bright_white().bold(), value.cyan().bold());
            } else {
                println!("  {:<18} {}", label, value);
            }
        }

        println!();
        self.print_severity_table(summary);
    }

    fn print_severity_table(&self, summary: &ExportSummary) {
        let severities = [
            (Severity::Critical, summary.critical_vulnerabilities),
            (Severity::High, summary.high_vulnerabilities),
            (Severity::Medium, summary.medium_vulnerabilities),
            (Severity::Low, summary.low_vulnerabilities),
        ];

        let active: Vec<_> = severities.iter().filter(|(_, count)| *count > 0).collect();
        if active.is_empty() {
            if self.use_colors {
                println!("  {}", "No vulnerabilities recorded".bright_green().bold());
            } else {
                println!("  No vulnerabilities recorded");
            }
            return;
        }

        if !self.use_colors {
            for (severity, count) in active {
                println!("  {:<10} {}", severity.as_str(), count);
            }
            return;
        }

        println!("  ┌─────────────┬───────┐");
        println!("  │ {} │ {} │",
            format!("{:<11}", "Severity").bright_white().bold(),
            "Count".bright_white().bold()
        );
        println!("  ├─────────────┼───────┤");

        for (severity, count) in active {
            let color = self.get_severity_color(severity);
            println!("  │ {} │ {:>5} │",
                format!("{:<11}", severity.as_str()).color(color).bold(),
                count.to_string().color(color).bold()
            );
        }

        println!("  └─────────────┴───────┘");
    }

    pub fn print_section_header(&self, title: &str) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("{}", title.bright_cyan().bold());
            println!("{}", "─".repeat(title.chars().count()).bright_cyan());
        } else {
            println!("{}", title);
            println!("{}", "=".repeat(title.len()));
        }
    }

    pub fn print_success(&self, message: &str) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("  {} {}", "✓".bright_green().bold(), message.green());
        } else {
            println!("[✓] {}", message);
        }
    }

    pub fn print_warning(&self, message: &str) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("  {} {}", "!".bright_yellow().bold(), message.yellow());
        } else {
            println!("[!] {}", message);
        }
    }

    /// Errors are printed even in quiet mode
    pub fn print_error(&self, message: &str) {
        if self.use_colors {
            eprintln!("  {} {}", "✗".bright_red().bold(), message.red().bold());
        } else {
            eprintln!("[✗] {}", message);
        }
    }

    pub fn print_info(&self, message: &str) {
        if self.quiet_mode { return; }

        if self.use_colors {
            println!("  {} {}", "i".bright_blue().bold(), message.blue());
        } else {
            println!("[i] {}", message);
        }
    }

    fn get_node_icon(&self, node_type: NodeType) -> &'static str {
        match node_type {
            NodeType::InitialTarget => "◎",
            NodeType::Subdomain | NodeType::DomainScan => "🌐",
            NodeType::IpAddress | NodeType::ActiveHost => "📡",
            NodeType::OpenPorts | NodeType::Service => "🔌",
            NodeType::VulnerabilityScan | NodeType::Vulnerability => "⚠️",
            NodeType::Exploitation => "🎯",
            NodeType::ExploitationSuccess => "🔥",
            NodeType::InternalScan => "🔀",
            NodeType::Custom => "•",
        }
    }

    fn get_node_color(&self, node: &ScanNode) -> Color {
        if let Some(finding) = &node.vulnerability_data {
            return self.get_severity_color(&finding.severity);
        }
        match node.node_type {
            NodeType::ExploitationSuccess => Color::BrightRed,
            NodeType::InternalScan => Color::Magenta,
            NodeType::Service | NodeType::OpenPorts => Color::Yellow,
            _ => Color::Cyan,
        }
    }

    fn get_severity_color(&self, severity: &Severity) -> Color {
        match severity {
            Severity::Critical => Color::BrightRed,
            Severity::High => Color::Red,
            Severity::Medium => Color::Yellow,
            Severity::Low => Color::Green,
            Severity::Info => Color::Blue,
        }
    }

    pub fn print_banner(&self, title: &str, subtitle: Option<&str>) {
        if self.quiet_mode { return; }

        let width = title.chars().count();
        if self.use_colors {
            println!();
            println!("  {}", "┌─".bright_cyan().to_string() + &"─".repeat(width + 2) + "─┐");
            println!("  {} {} {}",
                "│".bright_cyan(),
                title.bright_white().bold(),
                "│".bright_cyan()
            );
            if let Some(sub) = subtitle {
                println!("  {} {} {}",
                    "│".bright_cyan(),
                    format!("{:^width$}", sub, width = width).bright_black(),
                    "│".bright_cyan()
                );
            }
            println!("  {}", "└─".bright_cyan().to_string() + &"─".repeat(width + 2) + "─┘");
            println!();
        } else {
            let border = "=".repeat(width + 4);
            println!("\n{}", border);
            println!("  {}  ", title);
            if let Some(sub) = subtitle {
                println!("  {}  ", sub);
            }
            println!("{}\n", border);
        }
    }
}

impl Default for DisplayManager {
    fn default() -> Self {
        Self::new()
    }
}
