use crate::modules::names;
use crate::ScanError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub active_profile: String,
    pub engine: EngineConfig,
    pub reporting: ReportingConfig,
    pub modules: BTreeMap<String, ModuleConfig>,
    pub profiles: BTreeMap<String, ProfileConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub max_concurrent_tasks: usize,
    pub default_timeout: u64, // milliseconds
    pub default_rate_limit: u64, // requests per second
    pub event_buffer: usize,
}

/// Per-module execution settings handed to the module and used for its timeout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleConfig {
    pub timeout: u64, // milliseconds
    pub rate_limit: u64, // requests per second
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// A named bundle of rate-limit / depth / module-set settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileConfig {
    pub rate_limit: u64, // requests per second
    pub max_depth: u32,
    pub modules: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportingConfig {
    pub output_dir: PathBuf,
    pub formats: Vec<OutputFormat>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    Csv,
}

impl ModuleConfig {
    pub fn new(timeout: u64, rate_limit: u64) -> Self {
        Self {
            timeout,
            rate_limit,
            options: BTreeMap::new(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }
}

impl Default for Config {
    fn default() -> Self {
        let all_modules: Vec<String> = names::ALL.iter().map(|name| name.to_string()).collect();

        let mut modules = BTreeMap::new();
        modules.insert(names::SUBDOMAIN_SCANNER.to_string(), ModuleConfig::new(30_000, 50));
        modules.insert(names::PING_SCANNER.to_string(), ModuleConfig::new(5_000, 100));
        modules.insert(names::PORT_SCANNER.to_string(), ModuleConfig::new(60_000, 500));
        modules.insert(names::SERVICE_DETECTOR.to_string(), ModuleConfig::new(30_000, 50));
        modules.insert(names::VULNERABILITY_SCANNER.to_string(), ModuleConfig::new(120_000, 20));
        modules.insert(names::EXPLOITATION.to_string(), ModuleConfig::new(60_000, 5));
        modules.insert(names::INTERNAL_SCANNER.to_string(), ModuleConfig::new(60_000, 100));
        modules.insert(names::REPORT_GENERATOR.to_string(), ModuleConfig::new(5_000, 1_000));

        let mut profiles = BTreeMap::new();
        profiles.insert(
            "stealth".to_string(),
            ProfileConfig {
                rate_limit: 10,
                max_depth: 2,
                modules: vec![
                    names::SUBDOMAIN_SCANNER.to_string(),
                    names::PING_SCANNER.to_string(),
                    names::PORT_SCANNER.to_string(),
                ],
                description: "Low and slow discovery without active exploitation".to_string(),
            },
        );
        profiles.insert(
            "normal".to_string(),
            ProfileConfig {
                rate_limit: 100,
                max_depth: 5,
                modules: all_modules.clone(),
                description: "Balanced discovery, assessment and exploitation".to_string(),
            },
        );
        profiles.insert(
            "aggressive".to_string(),
            ProfileConfig {
                rate_limit: 1_000,
                max_depth: 10,
                modules: all_modules,
                description: "Fast, deep propagation including lateral movement".to_string(),
            },
        );

        Self {
            active_profile: "normal".to_string(),
            engine: EngineConfig {
                max_concurrent_tasks: 10,
                default_timeout: 30_000,
                default_rate_limit: 100,
                event_buffer: 1_024,
            },
            reporting: ReportingConfig {
                output_dir: PathBuf::from("./reports"),
                formats: vec![OutputFormat::Json],
            },
            modules,
            profiles,
        }
    }
}

impl Config {
    pub fn load_from_file(path: &str) -> crate::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &str) -> crate::Result<()> {
        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;
        Ok(())
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> crate::Result<()> {
        if self.engine.max_concurrent_tasks == 0 {
            return Err(ScanError::InvalidInput("max_concurrent_tasks must be at least 1".to_string()));
        }
        if self.engine.event_buffer == 0 {
            return Err(ScanError::InvalidInput("event_buffer must be at least 1".to_string()));
        }
        if self.engine.default_timeout == 0 {
            return Err(ScanError::InvalidInput("default_timeout must be greater than zero".to_string()));
        }
        if let Some((name, _)) = self.modules.iter().find(|(_, module)| module.timeout == 0) {
            return Err(ScanError::InvalidInput(format!("module {} has a zero timeout", name)));
        }
        if !self.profiles.contains_key(&self.active_profile) {
            return Err(ScanError::Profile(format!(
                "active profile '{}' is not defined",
                self.active_profile
            )));
        }
        Ok(())
    }

    pub fn module_timeout(&self, name: &str) -> Duration {
        self.module_config(name).timeout()
    }
}

/// Where the engine reads its settings from. `Config` is the file-backed provider;
/// hosts with their own settings store implement this instead.
pub trait ConfigProvider: Send + Sync {
    fn engine_config(&self) -> &EngineConfig;

    fn module_config(&self, name: &str) -> ModuleConfig;

    fn profile(&self, name: &str) -> Option<&ProfileConfig>;

    fn active_profile_name(&self) -> &str;

    /// Make `name` the active profile. Fails when no such profile exists.
    fn set_active_profile(&mut self, name: &str) -> crate::Result<()>;

    /// Reject settings the engine cannot run with.
    fn check(&self) -> crate::Result<()>;

    fn active_profile_config(&self) -> Option<&ProfileConfig> {
        self.profile(self.active_profile_name())
    }

    fn max_depth(&self) -> u32 {
        self.active_profile_config().map(|profile| profile.max_depth).unwrap_or(0)
    }
}

impl ConfigProvider for Config {
    fn engine_config(&self) -> &EngineConfig {
        &self.engine
    }

    /// Settings for `name`, falling back to engine defaults for unknown modules.
    /// The active profile's rate limit caps the module's own budget.
    fn module_config(&self, name: &str) -> ModuleConfig {
        let mut module = self
            .modules
            .get(name)
            .cloned()
            .unwrap_or_else(|| ModuleConfig::new(self.engine.default_timeout, self.engine.default_rate_limit));

        if let Some(profile) = self.active_profile_config() {
            module.rate_limit = module.rate_limit.min(profile.rate_limit);
        }
        module
    }

    fn profile(&self, name: &str) -> Option<&ProfileConfig> {
        self.profiles.get(name)
    }

    fn active_profile_name(&self) -> &str {
        &self.active_profile
    }

    fn set_active_profile(&mut self, name: &str) -> crate::Result<()> {
        if !self.profiles.contains_key(name) {
            return Err(ScanError::Profile(format!("unknown profile '{}'", name)));
        }
        self.active_profile = name.to_string();
        Ok(())
    }

    fn check(&self) -> crate::Result<()> {
        self.validate()
    }
}
