use data_loader::{DataIndex, DataPaths, DEFAULT_DATASET, Split, parser};
use std::time::Instant;

fn main() {
    let paths = DataPaths::new("data", DEFAULT_DATASET);

    println!("Loading DBbook training data...\n");

    let start = Instant::now();
    let index = DataIndex::load_from_files(
        &paths.interim_split(Split::Train),
        &paths.item_attributes(),
    )
    .expect("Failed to load dataset");
    let test = parser::parse_ratings(&paths.interim_split(Split::Test))
        .expect("Failed to load test split");
    let rows = index.join_split(&test);
    let elapsed = start.elapsed();

    let (users, items, ratings) = index.counts();

    println!("\n=== Load Complete ===");
    println!("Time taken: {:?}", elapsed);
    println!("Users: {}", users);
    println!("Items: {}", items);
    println!("Training ratings: {}", ratings);
    println!("Joined test rows: {}", rows.len());
    println!("\nPerformance: {:.0} ratings/second",
             (ratings + rows.len()) as f64 / elapsed.as_secs_f64());
}
