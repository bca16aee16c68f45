use bencher::{benchmark_group, benchmark_main, Bencher};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use small_world::facade::Builder;
use small_world::search::CancellationToken;
use small_world::types::Distance;

benchmark_main!(benches);
benchmark_group!(benches, build_heuristic, build_simple, search);

const SEED: u64 = 123456789;

#[derive(Clone, Copy, Debug)]
struct Point([f32; 16]);

fn distance(a: &Point, b: &Point) -> Distance<f32> {
    let sum: f32 = a.0.iter().zip(b.0.iter()).map(|(x, y)| (x - y).powi(2)).sum();
    Distance::from(sum.sqrt())
}

fn random_points(n: usize) -> Vec<Point> {
    let mut rng = SmallRng::seed_from_u64(SEED);
    (0..n).map(|_| Point(rng.gen())).collect()
}

fn build_heuristic(bench: &mut Bencher) {
    let points = random_points(1024);
    bench.iter(|| {
        let graph = Builder::new()
            .selector(small_world::select::NeighborSelector::Heuristic {
                expand_candidates: false,
                keep_pruned_connections: false,
            })
            .build(distance, SmallRng::seed_from_u64(SEED), None)
            .unwrap();
        graph.add_items(points.clone()).unwrap();
    })
}

fn build_simple(bench: &mut Bencher) {
    let points = random_points(1024);
    bench.iter(|| {
        let graph = Builder::new()
            .build(distance, SmallRng::seed_from_u64(SEED), None)
            .unwrap();
        graph.add_items(points.clone()).unwrap();
    })
}

fn search(bench: &mut Bencher) {
    let points = random_points(4096);
    let graph = Builder::new()
        .build(distance, SmallRng::seed_from_u64(SEED), None)
        .unwrap();
    graph.add_items(points.clone()).unwrap();
    let query = points[0];
    bench.iter(|| {
        graph
            .knn_search(&query, 10, |_| true, &CancellationToken::new())
            .unwrap()
    })
}
