//! Shared helpers for txbridge benchmarks.

use rand::Rng;

/// Payload sizes exercised by the dispatch benchmarks.
pub const PAYLOAD_SIZES: [usize; 4] = [64, 256, 1024, 4096];

/// Generate random data of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate a random printable field value of the specified length.
pub fn random_field(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen_range(b'a'..=b'z') as char).collect()
}
