//! Dry run example
//!
//! This example walks and flattens the repository and writes `request.txt`
//! without contacting the model. No API key is needed.

use cursor_rulegen::{Config, Pipeline};

fn main() -> anyhow::Result<()> {
    let root = std::env::args().nth(1).unwrap_or_else(|| ".".to_string());

    let config = Config::builder()
        .root_dir(root)
        .dry_run(true)
        .build()?;

    println!("Running in DRY RUN mode - only the request file is written\n");

    let stats = Pipeline::new(config)?.run()?;

    println!("Would have sent:");
    println!("  {} files", stats.total_files);
    println!("  {} bytes of listing", stats.flattened_bytes);
    println!("  Request saved to {}", stats.audit_file);

    Ok(())
}
