use chainscan::{
    config::Config,
    dispatch::ResultDispatcher,
    fallback::{Fallback, SimulatedFallback},
    graph::NodeGraph,
    modules::{names, ModuleRegistry},
    types::{ExploitAttempt, NodeType, ScanNode, Severity, TargetKind, VulnerabilityRecord},
    Engine, ScanResult,
};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::net::IpAddr;
use std::str::FromStr;

fn dispatch_benchmark(c: &mut Criterion) {
    let dispatcher = ResultDispatcher::new();
    let source = ScanNode::root("10.0.0.5", TargetKind::Ip, names::VULNERABILITY_SCANNER);

    let findings = ScanResult::VulnerabilityScanner {
        vulnerabilities: (0..20)
            .map(|i| VulnerabilityRecord {
                vuln_type: if i % 2 == 0 { "weak_password" } else { "smb_signing_disabled" }.to_string(),
                cve: None,
                description: "benchmark finding".to_string(),
                severity: Severity::High,
                port: Some(22),
                service: Some("ssh".to_string()),
                exploit_available: None,
            })
            .collect(),
    };

    c.bench_function("dispatch_vulnerabilities", |b| {
        b.iter(|| dispatcher.propagate(black_box(&findings), black_box(&source)))
    });

    let attempts = ScanResult::Exploitation {
        exploitation_results: (0..20)
            .map(|i| ExploitAttempt {
                vulnerability_type: Some("weak_password".to_string()),
                target: Some(format!("10.0.0.{}", i)),
                success: i % 3 == 0,
                access_type: Some("ssh_access".to_string()),
                details: None,
            })
            .collect(),
    };

    c.bench_function("dispatch_exploitation", |b| {
        b.iter(|| dispatcher.propagate(black_box(&attempts), black_box(&source)))
    });
}

fn graph_benchmark(c: &mut Criterion) {
    c.bench_function("graph_enqueue_dequeue", |b| {
        b.iter(|| {
            let mut graph = NodeGraph::new(5);
            let mut parents = Vec::new();
            for i in 0..50 {
                if let Ok(id) = graph.add_initial_target(&format!("10.0.{}.1", i)) {
                    parents.extend(graph.get(&id).cloned());
                }
            }
            for parent in &parents {
                for host in 0..4 {
                    let child = ScanNode::child_of(parent, NodeType::ActiveHost, format!("{}-{}", parent.data, host));
                    graph.add_discovered_node(child);
                }
            }
            while !graph.dequeue_batch(black_box(10)).is_empty() {}
            black_box(graph.len())
        })
    });
}

fn fallback_benchmark(c: &mut Criterion) {
    let fallback = SimulatedFallback::new();
    let node = ScanNode::root("example.com", TargetKind::Domain, names::SUBDOMAIN_SCANNER);

    c.bench_function("simulated_fallback", |b| {
        b.iter(|| fallback.simulate(black_box(&node)))
    });
}

fn propagation_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("simulated_propagation_depth_4", |b| {
        b.to_async(&rt).iter(|| async {
            let mut config = Config::default();
            if let Some(profile) = config.profiles.get_mut("normal") {
                profile.max_depth = 4;
            }
            let mut engine = Engine::new(config, ModuleRegistry::new()).unwrap();
            engine.add_target("example.com").unwrap();
            black_box(engine.run().await)
        })
    });
}

// Network utilities benchmark
fn network_utils_benchmark(c: &mut Criterion) {
    use chainscan::utils::network::*;

    let ip = IpAddr::from_str("192.168.1.1").unwrap();

    c.bench_function("is_private_ip", |b| {
        b.iter(|| {
            is_private_ip(&black_box(ip))
        })
    });

    c.bench_function("well_known_service", |b| {
        b.iter(|| {
            well_known_service(black_box(3306))
        })
    });
}

criterion_group!(
    benches,
    dispatch_benchmark,
    graph_benchmark,
    fallback_benchmark,
    propagation_benchmark,
    network_utils_benchmark
);
criterion_main!(benches);
