//! The module boundary: the `scan(input) -> result` contract every scanning capability
//! implements, the name → factory registry the host application fills in, and the
//! node-type → module lookup used when a node carries no explicit module.

use crate::config::ModuleConfig;
use crate::result::ScanResult;
use crate::types::{NodeType, ScanNode, ServiceInfo, VulnerabilityRecord};
use crate::Result;
use async_trait::async_trait;
use log::{debug, info};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Well-known module names.
pub mod names {
    pub const SUBDOMAIN_SCANNER: &str = "subdomain_scanner";
    pub const PING_SCANNER: &str = "ping_scanner";
    pub const PORT_SCANNER: &str = "port_scanner";
    pub const SERVICE_DETECTOR: &str = "service_detector";
    pub const VULNERABILITY_SCANNER: &str = "vulnerability_scanner";
    pub const EXPLOITATION: &str = "exploitation";
    pub const INTERNAL_SCANNER: &str = "internal_scanner";
    pub const REPORT_GENERATOR: &str = "report_generator";

    pub const ALL: &[&str] = &[
        SUBDOMAIN_SCANNER,
        PING_SCANNER,
        PORT_SCANNER,
        SERVICE_DETECTOR,
        VULNERABILITY_SCANNER,
        EXPLOITATION,
        INTERNAL_SCANNER,
        REPORT_GENERATOR,
    ];
}

/// Arguments handed to a module: the node payload plus whatever context the node carries.
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleInput {
    Target(String),
    WithServices(String, Vec<ServiceInfo>),
    WithVulnerabilities(String, Vec<VulnerabilityRecord>),
}

impl ModuleInput {
    /// `[data]`, `[data, services]` or `[data, vulnerabilities]` depending on the node.
    pub fn for_node(node: &ScanNode) -> Self {
        if let Some(services) = &node.services {
            ModuleInput::WithServices(node.data.clone(), services.clone())
        } else if let Some(vulnerabilities) = &node.vulnerabilities {
            ModuleInput::WithVulnerabilities(node.data.clone(), vulnerabilities.clone())
        } else {
            ModuleInput::Target(node.data.clone())
        }
    }

    pub fn target(&self) -> &str {
        match self {
            ModuleInput::Target(data)
            | ModuleInput::WithServices(data, _)
            | ModuleInput::WithVulnerabilities(data, _) => data,
        }
    }
}

#[async_trait]
pub trait ScanModule: Send + Sync {
    fn name(&self) -> &str;

    async fn scan(&self, input: ModuleInput) -> Result<ScanResult>;

    /// Receives new settings when the active profile changes. Modules own their rate limiting.
    fn update_config(&self, _config: &ModuleConfig) {}
}

pub type ModuleFactory = Box<dyn Fn() -> Arc<dyn ScanModule> + Send + Sync>;

/// Module used for a node that does not name one explicitly.
pub fn default_module_for(node_type: NodeType) -> Option<&'static str> {
    match node_type {
        NodeType::InitialTarget | NodeType::Subdomain | NodeType::IpAddress => Some(names::PING_SCANNER),
        NodeType::DomainScan => Some(names::SUBDOMAIN_SCANNER),
        NodeType::ActiveHost => Some(names::PORT_SCANNER),
        NodeType::OpenPorts => Some(names::SERVICE_DETECTOR),
        NodeType::Service | NodeType::VulnerabilityScan => Some(names::VULNERABILITY_SCANNER),
        NodeType::Vulnerability | NodeType::ExploitationSuccess => Some(names::REPORT_GENERATOR),
        NodeType::Exploitation => Some(names::EXPLOITATION),
        NodeType::InternalScan => Some(names::INTERNAL_SCANNER),
        NodeType::Custom => None,
    }
}

/// Name of the module a node should run with: its own, else the type default.
pub fn module_name_for(node: &ScanNode) -> Option<String> {
    node.module
        .clone()
        .or_else(|| default_module_for(node.node_type).map(str::to_string))
}

/// Name → factory mapping supplied by the host. Instances are built on first use and
/// cached so configuration pushes reach the same object that runs scans.
#[derive(Default)]
pub struct ModuleRegistry {
    factories: BTreeMap<String, ModuleFactory>,
    instances: RwLock<BTreeMap<String, Arc<dyn ScanModule>>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn ScanModule> + Send + Sync + 'static,
    {
        let name = name.into();
        info!("Registered module {}", name);
        self.instances.write().remove(&name);
        self.factories.insert(name, Box::new(factory));
    }

    /// Register an already built instance under `name`.
    pub fn register_instance(&mut self, name: impl Into<String>, module: Arc<dyn ScanModule>) {
        let name = name.into();
        let shared = module.clone();
        self.register(name.clone(), move || shared.clone());
        self.instances.write().insert(name, module);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ScanModule>> {
        self.get_with(name, |_| {})
    }

    /// Like [`ModuleRegistry::get`], running `on_create` once on a freshly built instance.
    pub fn get_with<F>(&self, name: &str, on_create: F) -> Option<Arc<dyn ScanModule>>
    where
        F: FnOnce(&dyn ScanModule),
    {
        if let Some(instance) = self.instances.read().get(name) {
            return Some(instance.clone());
        }

        let factory = self.factories.get(name)?;
        let mut instances = self.instances.write();
        let instance = instances
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!("Instantiating module {}", name);
                let module = factory();
                on_create(module.as_ref());
                module
            })
            .clone();
        Some(instance)
    }

    /// Push settings into every module that has already been instantiated.
    pub fn push_config<F>(&self, config_for: F) -> usize
    where
        F: Fn(&str) -> ModuleConfig,
    {
        let instances = self.instances.read();
        for (name, module) in instances.iter() {
            module.update_config(&config_for(name));
        }
        instances.len()
    }
}
