use std::path::PathBuf;

use rand::Rng;
use rand::distr::Alphanumeric;

fn random_string(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect::<String>()
}

/// Creates a fresh, empty directory under the system temp dir.
pub fn temp_dir() -> PathBuf {
    let path = std::env::temp_dir().join(format!("http-sd-{}", random_string(16)));
    std::fs::create_dir_all(&path).expect("create temp dir");
    path
}
