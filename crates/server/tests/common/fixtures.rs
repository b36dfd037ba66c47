//! Test fixtures for generating test data.

use bytes::Bytes;

/// Generate deterministic test data based on a seed.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

/// An `app` full name for a linux/amd64 widget.
#[allow(dead_code)]
pub fn widget_name(tag: &str) -> String {
    format!("linux-amd64-widget:{tag}")
}
