use criterion::{black_box, criterion_group, criterion_main, Criterion};
use knn_index::{create_searcher, CloudView, NearestNeighbor, SearchFlags, SearchKind};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DIM: usize = 3;
const COUNT: usize = 100_000;
const K: usize = 10;

fn uniform_cloud(count: usize, dim: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count * dim).map(|_| rng.gen::<f64>()).collect()
}

fn variants() -> Vec<(&'static str, SearchKind)> {
    vec![
        ("brute force", SearchKind::BruteForce),
        ("balanced nodes pq", SearchKind::BalancedNodesPq),
        ("balanced nodes stack", SearchKind::BalancedNodesStack),
        (
            "balanced leaves",
            SearchKind::BalancedLeaves {
                balance_variance: true,
            },
        ),
        ("midpoint", SearchKind::Midpoint),
        ("midpoint linear heap", SearchKind::MidpointLinearHeap),
        ("midpoint tree heap", SearchKind::MidpointTreeHeap),
        ("midpoint explicit bounds", SearchKind::MidpointExplicitBounds),
    ]
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let coords = uniform_cloud(COUNT, DIM, 42);
    let queries = uniform_cloud(1000, DIM, 43);

    for (name, kind) in variants() {
        if kind != SearchKind::BruteForce {
            c.bench_function(&format!("construction ({name})"), |b| {
                b.iter(|| {
                    let cloud = CloudView::try_new(&coords, DIM).unwrap();
                    create_searcher(black_box(cloud), kind)
                })
            });
        }
    }

    for (name, kind) in variants() {
        let cloud = CloudView::try_new(&coords, DIM).unwrap();
        let searcher = create_searcher(cloud, kind);
        let mut column = 0;

        c.bench_function(&format!("query k={K} ({name})"), |b| {
            b.iter(|| {
                let query = &queries[column * DIM..(column + 1) * DIM];
                column = (column + 1) % 1000;
                searcher
                    .knn(black_box(query), K, 0., SearchFlags::empty())
                    .unwrap()
            })
        });
    }

    for (name, kind) in [
        ("midpoint linear heap", SearchKind::MidpointLinearHeap),
        ("balanced nodes stack", SearchKind::BalancedNodesStack),
    ] {
        let cloud = CloudView::try_new(&coords, DIM).unwrap();
        let searcher = create_searcher(cloud, kind);

        c.bench_function(&format!("batch of 1000 queries ({name})"), |b| {
            b.iter(|| {
                searcher
                    .knn_batch(black_box(&queries), K, 0., SearchFlags::empty())
                    .unwrap()
            })
        });

        c.bench_function(&format!("approximate query eps=0.5 ({name})"), |b| {
            b.iter(|| {
                searcher
                    .knn(black_box(&queries[..DIM]), K, 0.5, SearchFlags::empty())
                    .unwrap()
            })
        });
    }
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
