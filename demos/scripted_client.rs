//! Custom completion client example
//!
//! Any type implementing `CompletionClient` can stand in for the HTTP
//! client, here one that answers with a fixed reply.

use cursor_rulegen::{CompletionClient, CompletionRequest, Config, Pipeline, Role};

struct CannedClient;

impl CompletionClient for CannedClient {
    fn complete(&self, request: &CompletionRequest) -> cursor_rulegen::Result<String> {
        let prompt_len = request.message(Role::User).map_or(0, str::len);

        Ok(format!(
            "### .cursor/rules\n\
             - Prompt was {prompt_len} bytes\n\
             - Keep modules small\n\n\
             ### .cursor/missing-features.md\n\
             - Nothing yet\n"
        ))
    }
}

fn main() -> anyhow::Result<()> {
    let root = std::env::args().nth(1).unwrap_or_else(|| ".".to_string());

    // The key is never sent anywhere, but validation still requires one.
    let config = Config::builder()
        .root_dir(root)
        .api_key("offline")
        .build()?;

    let stats = Pipeline::with_client(config, Box::new(CannedClient))?.run()?;
    stats.print_summary();

    for output in &stats.outputs {
        println!("✓ Wrote {output}");
    }

    Ok(())
}
