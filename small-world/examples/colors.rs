use rand::rngs::SmallRng;
use rand::SeedableRng;

use small_world::facade::Builder;
use small_world::search::CancellationToken;
use small_world::types::Distance;

fn main() {
    tracing_subscriber::fmt::init();

    let points = vec![Point([255, 0, 0]), Point([0, 255, 0]), Point([0, 0, 255])];
    let names = ["red", "green", "blue"];

    let graph = Builder::new()
        .build(distance, SmallRng::seed_from_u64(0), None)
        .unwrap();
    let ids = graph.add_items(points).unwrap();

    let hits = graph
        .knn_search(&Point([204, 85, 0]), 1, |_| true, &CancellationToken::new())
        .unwrap();
    let closest = hits.first().unwrap();
    let name = names[ids.iter().position(|&id| id == closest.id).unwrap()];

    println!("{name}");
}

#[derive(Clone, Copy, Debug)]
struct Point([isize; 3]);

fn distance(a: &Point, b: &Point) -> Distance<f32> {
    let sum: f32 = a
        .0
        .iter()
        .zip(b.0.iter())
        .map(|(x, y)| ((x - y) * (x - y)) as f32)
        .sum();
    Distance::from(sum.sqrt())
}
