/// Network utilities
pub mod network {
    use std::net::IpAddr;

    /// Check if an IP address is in a private range
    pub fn is_private_ip(ip: &IpAddr) -> bool {
        match ip {
            IpAddr::V4(ipv4) => {
                ipv4.is_private() || ipv4.is_loopback() || ipv4.is_link_local()
            }
            IpAddr::V6(ipv6) => {
                ipv6.is_loopback() || (ipv6.segments()[0] & 0xfe00) == 0xfc00 || (ipv6.segments()[0] & 0xffc0) == 0xfe80
            }
        }
    }

    /// Check if an IP address is valid for scanning
    pub fn is_valid_scan_target(ip: &IpAddr) -> bool {
        match ip {
            IpAddr::V4(ipv4) => {
                !ipv4.is_unspecified() &&
                !ipv4.is_broadcast() &&
                !ipv4.is_multicast() &&
                !ipv4.is_documentation()
            }
            IpAddr::V6(ipv6) => {
                !ipv6.is_unspecified() &&
                !ipv6.is_multicast()
            }
        }
    }

    /// Service name conventionally bound to a TCP port
    pub fn well_known_service(port: u16) -> &'static str {
        match port {
            21 => "ftp",
            22 => "ssh",
            23 => "telnet",
            25 => "smtp",
            53 => "dns",
            80 => "http",
            110 => "pop3",
            135 => "msrpc",
            139 => "netbios-ssn",
            143 => "imap",
            443 => "https",
            445 => "microsoft-ds",
            993 => "imaps",
            995 => "pop3s",
            1433 => "mssql",
            3306 => "mysql",
            3389 => "rdp",
            5432 => "postgresql",
            6379 => "redis",
            8080 => "http-alt",
            _ => "unknown",
        }
    }
}

/// Progress reporting utilities
pub mod progress {
    use indicatif::{ProgressBar, ProgressStyle};
    use std::time::Duration;

    pub fn create_spinner(message: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();

        // Clean spinner style
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("  {spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );

        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }
}

/// Time and formatting utilities
pub mod time {
    use std::time::{Duration, SystemTime};

    /// Format duration as human readable string
    pub fn format_duration(duration: Duration) -> String {
        let secs = duration.as_secs();
        let hours = secs / 3600;
        let minutes = (secs % 3600) / 60;
        let seconds = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Calculate elapsed time since start
    pub fn elapsed_since(start: SystemTime) -> Duration {
        SystemTime::now().duration_since(start).unwrap_or_default()
    }
}
