//! Benchmarks for centrality and community detection
//!
//! Run with: cargo bench -p dtnsim-social

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use dtnsim_core::HostId;
use dtnsim_social::{
    AvgDegreeCentrality, CWindowCentrality, Centrality, CommunityDetection, ContactHistory,
    SWindowCentrality, SimpleCommunityDetection,
};

/// `peers` peers, each met `contacts` times over a day
fn busy_history(peers: u32, contacts: u32) -> ContactHistory {
    let mut history = ContactHistory::new();
    for c in 0..contacts {
        for p in 0..peers {
            let start = (c * 86_400 / contacts + p) as f64;
            history.open_contact(HostId(p + 1), start);
            history.close_contact(HostId(p + 1), start + 120.0);
        }
    }
    history
}

fn bench_centrality(c: &mut Criterion) {
    let mut group = c.benchmark_group("centrality_global");
    let now = 86_400.0;
    for peers in [10, 100, 500] {
        let history = busy_history(peers, 24);
        let estimators: [(&str, Box<dyn Centrality>); 3] = [
            ("swindow", Box::new(SWindowCentrality::new(21_600.0, 0.0))),
            ("cwindow", Box::new(CWindowCentrality::new(21_600.0, 0.0, 5))),
            ("avg_degree", Box::new(AvgDegreeCentrality::new(21_600.0, 0.0))),
        ];
        for (name, estimator) in estimators {
            group.bench_with_input(BenchmarkId::new(name, peers), &peers, |b, _| {
                b.iter(|| black_box(estimator.global(&history, now)))
            });
        }
    }
    group.finish();
}

fn bench_simple_exchange(c: &mut Criterion) {
    c.bench_function("simple_new_connection", |b| {
        let proto = SimpleCommunityDetection::new(0.0, 0.0, 60.0);
        b.iter(|| {
            let mut nodes: Vec<Box<dyn CommunityDetection>> =
                (0..50).map(|i| proto.replicate(HostId(i))).collect();
            for i in 0..50u32 {
                let peer = (i + 1) % 50;
                nodes[i as usize].connection_lost(
                    HostId(i),
                    HostId(peer),
                    None,
                    &[dtnsim_social::ContactInterval { start: 0.0, end: 100.0 }],
                );
            }
            for i in 0..49usize {
                let (left, right) = nodes.split_at_mut(i + 1);
                left[i].new_connection(HostId(i as u32), HostId(i as u32 + 1), right[0].as_mut());
            }
            black_box(nodes[0].local_community().len())
        })
    });
}

criterion_group!(benches, bench_centrality, bench_simple_exchange);
criterion_main!(benches);
