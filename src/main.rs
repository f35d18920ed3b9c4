use std::env;
use std::error::Error;
use std::fs;

use tern::{demo_envelope, process_envelope};

fn main() -> Result<(), Box<dyn Error>> {
    let bytes = match env::args().nth(1) {
        Some(path) => fs::read(path)?,
        None => demo_envelope().to_vec()?,
    };

    let processed = process_envelope(&bytes)?;

    println!(
        "envelope: {} item(s), {} normalized, {} measures merged, {} skipped",
        processed.envelope.items.len(),
        processed.outcome.normalized_items,
        processed.outcome.merged_measure_items,
        processed.outcome.skipped_items,
    );
    for item in &processed.envelope.items {
        let size = item.payload.as_bytes().map(<[u8]>::len).unwrap_or(0);
        println!("  - type={} bytes={}", item.item_type(), size);
    }

    Ok(())
}
