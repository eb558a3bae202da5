//! The propagation engine: owns the node graph, runs queued nodes in bounded batches,
//! and folds every finished task back into the graph through the dispatcher.
//!
//! Only the batch-completion point mutates graph, queue, ledger and counters. Tasks
//! in a batch run concurrently behind a counting gate and hand their outcome back.

use crate::config::{Config, ConfigProvider, OutputFormat};
use crate::dispatch::{Propagation, ResultDispatcher};
use crate::events::{self, EngineEvent, EventReceiver, EventSender};
use crate::fallback::{Fallback, SimulatedFallback};
use crate::modules::{self, ModuleInput, ModuleRegistry, ScanModule};
use crate::reporting::ExportDocument;
use crate::result::ScanResult;
use crate::stats::{Snapshot, Statistics};
use crate::types::{CompletedScan, NodeId, ScanNode};
use crate::graph::{classify_target, NodeGraph};
use crate::{Result, ScanError};
use futures::future::join_all;
use futures::FutureExt;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Semaphore, SemaphorePermit};
use tokio::time::timeout;

/// Counting semaphore that also records how many permits are held and the highest
/// count ever observed.
pub struct ConcurrencyGate {
    semaphore: Semaphore,
    limit: usize,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

pub struct GatePermit<'a> {
    _permit: SemaphorePermit<'a>,
    gate: &'a ConcurrencyGate,
}

impl ConcurrencyGate {
    pub fn new(limit: usize) -> Self {
        Self {
            semaphore: Semaphore::new(limit),
            limit,
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub async fn acquire(&self) -> Result<GatePermit<'_>> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| ScanError::Unknown("concurrency gate closed".to_string()))?;
        let held = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(held, Ordering::SeqCst);
        Ok(GatePermit {
            _permit: permit,
            gate: self,
        })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

impl Drop for GatePermit<'_> {
    fn drop(&mut self) {
        self.gate.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Shared stop flag, checked between batches.
#[derive(Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Shared slot for a profile switch requested while the engine is draining.
/// The latest request wins and is applied before the next batch is dequeued.
#[derive(Clone, Default)]
pub struct ProfileHandle(Arc<Mutex<Option<String>>>);

impl ProfileHandle {
    pub fn request(&self, profile: &str) {
        *self.0.lock() = Some(profile.to_string());
    }

    pub fn pending(&self) -> Option<String> {
        self.0.lock().clone()
    }

    fn take(&self) -> Option<String> {
        self.0.lock().take()
    }
}

enum Outcome {
    Completed(ScanResult),
    Simulated(ScanResult),
    Failed(String),
}

struct TaskOutcome {
    node: ScanNode,
    module: String,
    invoked: bool,
    outcome: Outcome,
}

pub struct Engine<C = Config> {
    config: C,
    graph: NodeGraph,
    registry: ModuleRegistry,
    dispatcher: ResultDispatcher,
    fallback: Box<dyn Fallback>,
    ledger: BTreeMap<NodeId, CompletedScan>,
    stats: Statistics,
    gate: ConcurrencyGate,
    events: EventSender,
    receiver: Option<EventReceiver>,
    stop: StopHandle,
    profile_requests: ProfileHandle,
}

impl<C: ConfigProvider> Engine<C> {
    /// Build an engine over `registry`. Fails on configuration the engine cannot run with.
    pub fn new(config: C, registry: ModuleRegistry) -> Result<Self> {
        config.check()?;

        let (events, receiver) = events::channel(config.engine_config().event_buffer);
        let engine = Self {
            graph: NodeGraph::new(config.max_depth()),
            gate: ConcurrencyGate::new(config.engine_config().max_concurrent_tasks),
            config,
            registry,
            dispatcher: ResultDispatcher::new(),
            fallback: Box::new(SimulatedFallback::new()),
            ledger: BTreeMap::new(),
            stats: Statistics::default(),
            events,
            receiver: Some(receiver),
            stop: StopHandle::default(),
            profile_requests: ProfileHandle::default(),
        };

        for name in engine.registry.names() {
            engine.events.emit(EngineEvent::ModuleRegistered { name });
        }

        info!(
            "Engine ready: profile {}, max depth {}, {} concurrent tasks, {} modules",
            engine.config.active_profile_name(),
            engine.graph.max_depth(),
            engine.gate.limit(),
            engine.registry.len()
        );
        Ok(engine)
    }

    /// Rebuild an engine from an exported snapshot. Restored nodes are not re-queued.
    pub fn from_export(document: ExportDocument, config: C, registry: ModuleRegistry) -> Result<Self> {
        let mut engine = Self::new(config, registry)?;
        for node in document.discovered_nodes {
            engine.graph.restore(node);
        }
        engine.ledger = document.completed_scans;
        engine.stats = document.statistics;
        Ok(engine)
    }

    pub fn with_fallback(mut self, fallback: Box<dyn Fallback>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn set_fallback(&mut self, fallback: Box<dyn Fallback>) {
        self.fallback = fallback;
    }

    /// Hand out the observer channel. Only the first caller receives it.
    pub fn subscribe(&mut self) -> Option<EventReceiver> {
        self.receiver.take()
    }

    pub fn register_module<F>(&mut self, name: &str, factory: F)
    where
        F: Fn() -> Arc<dyn ScanModule> + Send + Sync + 'static,
    {
        self.registry.register(name, factory);
        self.events.emit(EngineEvent::ModuleRegistered { name: name.to_string() });
    }

    pub fn add_target(&mut self, target: &str) -> Result<NodeId> {
        let id = self.graph.add_initial_target(target)?;
        self.announce_root(id);
        Ok(id)
    }

    /// Add a target but pin the module it starts with.
    pub fn add_target_with_module(&mut self, target: &str, module: &str) -> Result<NodeId> {
        let (kind, _) = classify_target(target.trim());
        let id = self.graph.add_initial_target_with_module(target, kind, module)?;
        self.announce_root(id);
        Ok(id)
    }

    fn announce_root(&mut self, id: NodeId) {
        self.stats.nodes_discovered += 1;
        if let Some(node) = self.graph.get(&id) {
            info!("Added target {} ({})", node.data, node.module.as_deref().unwrap_or("-"));
            self.events.emit(EngineEvent::NodeAdded { node: node.clone() });
        }
    }

    /// Enter a successor node into the graph if it is within the depth bound.
    pub fn add_discovered_node(&mut self, node: ScanNode) -> bool {
        let accepted = self.graph.add_discovered_node(node.clone());
        if accepted {
            self.stats.nodes_discovered += 1;
            debug!("Discovered {} {} at depth {}", node.node_type, node.data, node.depth);
            self.events.emit(EngineEvent::NodeDiscovered { node });
        }
        accepted
    }

    /// Drain the queue batch by batch until it is empty or the engine is stopped.
    pub async fn run(&mut self) -> Snapshot {
        self.events.emit(EngineEvent::ScanStarted {
            pending: self.graph.pending(),
            max_depth: self.graph.max_depth(),
            max_concurrent_tasks: self.gate.limit(),
        });
        info!("Propagation started with {} pending nodes", self.graph.pending());

        loop {
            if self.stop.is_stopped() {
                warn!("Engine stopped with {} nodes pending", self.graph.pending());
                self.events.emit(EngineEvent::EngineStopped {
                    pending: self.graph.pending(),
                });
                break;
            }

            if let Some(profile) = self.profile_requests.take() {
                if let Err(e) = self.switch_profile(&profile) {
                    warn!("Ignoring profile switch: {}", e);
                }
            }

            let batch = self.graph.dequeue_batch(self.gate.limit());
            if batch.is_empty() {
                break;
            }

            debug!("Running batch of {} nodes", batch.len());
            let outcomes = join_all(batch.into_iter().map(|node| self.execute(node))).await;
            for outcome in outcomes {
                self.integrate(outcome);
            }

            self.events.emit(EngineEvent::ProgressUpdate {
                snapshot: self.snapshot(),
            });
        }

        let snapshot = self.snapshot();
        info!(
            "Propagation finished: {} scans ({} failed), {} nodes, {} vulnerabilities",
            snapshot.statistics.total_scans,
            snapshot.statistics.failed_scans,
            snapshot.total_nodes,
            snapshot.statistics.vulnerabilities_found
        );
        self.events.emit(EngineEvent::ScanCompleted {
            snapshot: snapshot.clone(),
        });
        snapshot
    }

    async fn execute(&self, node: ScanNode) -> TaskOutcome {
        let permit = match self.gate.acquire().await {
            Ok(permit) => permit,
            Err(e) => {
                return TaskOutcome {
                    module: modules::module_name_for(&node).unwrap_or_default(),
                    node,
                    invoked: false,
                    outcome: Outcome::Failed(e.to_string()),
                }
            }
        };

        let resolved = modules::module_name_for(&node).and_then(|name| {
            let module = self.registry.get_with(&name, |created| {
                created.update_config(&self.config.module_config(&name))
            })?;
            Some((name, module))
        });

        let Some((name, module)) = resolved else {
            let label = self.fallback.name().to_string();
            debug!("No module for {} {}, using {} fallback", node.node_type, node.data, label);
            self.emit_started(&node, &label);
            let simulated = catch_unwind(AssertUnwindSafe(|| self.fallback.simulate(&node)));
            drop(permit);
            let outcome = match simulated {
                Ok(result) => Outcome::Simulated(result),
                Err(_) => Outcome::Failed(format!("fallback {} panicked", label)),
            };
            return TaskOutcome {
                node,
                module: label,
                invoked: false,
                outcome,
            };
        };

        self.emit_started(&node, &name);
        let limit = self.config.module_config(&name).timeout();
        let scan = AssertUnwindSafe(module.scan(ModuleInput::for_node(&node))).catch_unwind();

        let outcome = match timeout(limit, scan).await {
            Ok(Ok(Ok(result))) => Outcome::Completed(result),
            Ok(Ok(Err(e))) => Outcome::Failed(e.to_string()),
            Ok(Err(_)) => Outcome::Failed(format!("module {} panicked", name)),
            Err(_) => Outcome::Failed("timeout".to_string()),
        };
        drop(permit);

        TaskOutcome {
            node,
            module: name,
            invoked: true,
            outcome,
        }
    }

    fn emit_started(&self, node: &ScanNode, module: &str) {
        self.events.emit(EngineEvent::TaskStarted {
            node_id: node.id,
            node_type: node.node_type,
            data: node.data.clone(),
            module: module.to_string(),
        });
    }

    fn integrate(&mut self, task: TaskOutcome) {
        let TaskOutcome { node, module, invoked, outcome } = task;
        if invoked {
            self.stats.modules_executed += 1;
        }

        let propagation = match outcome {
            Outcome::Failed(error) => return self.record_failure(&node, module, error),
            Outcome::Completed(result) => {
                match self.dispatcher.dispatch(&result, &node, self.fallback.as_ref()) {
                    Ok(propagation) => {
                        self.ledger.insert(node.id, CompletedScan::success(module.as_str(), result));
                        propagation
                    }
                    Err(e) => return self.record_failure(&node, module, e.to_string()),
                }
            }
            Outcome::Simulated(result) => {
                let mut propagation = self.dispatcher.propagate(&result, &node);
                propagation.simulated = true;
                self.ledger.insert(node.id, CompletedScan::success(module.as_str(), result));
                propagation
            }
        };

        self.stats.record_success();
        let simulated = propagation.simulated;
        let spawned = self.absorb(propagation);
        self.events.emit(EngineEvent::TaskCompleted {
            node_id: node.id,
            module,
            spawned,
            simulated,
        });
    }

    fn record_failure(&mut self, node: &ScanNode, module: String, error: String) {
        warn!("{} on {} failed: {}", module, node.data, error);
        self.stats.record_failure();
        self.ledger.insert(node.id, CompletedScan::failed(module.as_str(), error.as_str()));
        self.events.emit(EngineEvent::TaskFailed {
            node_id: node.id,
            module,
            error,
        });
    }

    fn absorb(&mut self, propagation: Propagation) -> usize {
        self.stats.absorb(&propagation);
        propagation
            .spawned
            .into_iter()
            .map(|node| self.add_discovered_node(node))
            .filter(|accepted| *accepted)
            .count()
    }

    /// Switch the active profile: new depth bound and rate limit take effect immediately
    /// and are pushed into every instantiated module. Use [`Engine::profile_handle`] to
    /// switch while [`Engine::run`] is draining.
    pub fn switch_profile(&mut self, name: &str) -> Result<()> {
        let profile = self
            .config
            .profile(name)
            .cloned()
            .ok_or_else(|| ScanError::Profile(format!("unknown profile '{}'", name)))?;

        self.config.set_active_profile(name)?;
        self.graph.set_max_depth(profile.max_depth);
        let config = &self.config;
        let pushed = self.registry.push_config(|module| config.module_config(module));

        info!(
            "Switched to profile {} (max depth {}, rate limit {}/s, {} modules updated)",
            name, profile.max_depth, profile.rate_limit, pushed
        );
        self.events.emit(EngineEvent::ProfileChanged {
            name: name.to_string(),
            profile,
        });
        Ok(())
    }

    /// Replace the configuration between runs.
    pub fn reload_config(&mut self, config: C) -> Result<()> {
        config.check()?;

        let limit = config.engine_config().max_concurrent_tasks;
        if limit != self.gate.limit() {
            self.gate = ConcurrencyGate::new(limit);
        }
        self.config = config;
        self.graph.set_max_depth(self.config.max_depth());
        let config = &self.config;
        self.registry.push_config(|module| config.module_config(module));

        info!("Configuration reloaded, active profile {}", self.config.active_profile_name());
        self.events.emit(EngineEvent::ConfigReloaded {
            active_profile: self.config.active_profile_name().to_string(),
        });
        Ok(())
    }

    /// Override the depth bound of the running session.
    pub fn set_max_depth(&mut self, max_depth: u32) {
        self.graph.set_max_depth(max_depth);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            statistics: self.stats.clone(),
            pending: self.graph.pending(),
            total_nodes: self.graph.len(),
            completed: self.ledger.len(),
            pruned: self.graph.pruned(),
            active_profile: self.config.active_profile_name().to_string(),
        }
    }

    /// Write the graph, ledger and counters to `path` as JSON.
    pub async fn export(&self, path: &Path) -> Result<PathBuf> {
        self.export_as(path, OutputFormat::Json).await
    }

    pub async fn export_as(&self, path: &Path, format: OutputFormat) -> Result<PathBuf> {
        let document = ExportDocument::capture(self);
        match format {
            OutputFormat::Json => document.write_json(path).await?,
            OutputFormat::Csv => document.write_csv(path).await?,
        }

        info!("Exported {} nodes to {}", document.discovered_nodes.len(), path.display());
        self.events.emit(EngineEvent::ResultsExported {
            path: path.to_path_buf(),
            nodes: document.discovered_nodes.len(),
        });
        Ok(path.to_path_buf())
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn profile_handle(&self) -> ProfileHandle {
        self.profile_requests.clone()
    }

    pub fn graph(&self) -> &NodeGraph {
        &self.graph
    }

    pub fn ledger(&self) -> &BTreeMap<NodeId, CompletedScan> {
        &self.ledger
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    pub fn dropped_events(&self) -> u64 {
        self.events.dropped()
    }
}
