use anyhow::Context;
use clap::Parser;
use cursor_rulegen::{ConfigBuilder, Pipeline};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    name = "cursor-rulegen",
    version,
    author,
    about = "Generate Cursor rules for a git repository",
    long_about = "Generate Cursor editor rules for a git repository.\n\n\
    The tool walks the repository (honouring .gitignore), flattens every file into \
    request.txt, asks a chat-completion model to summarize the project and writes \
    .cursor/rules and .cursor/missing-features.md.\n\n\
    The API key is read from OPENAI_API_KEY.\n\n\
    USAGE EXAMPLES:\n  \
      # Generate rules for the current repository\n  \
      cursor-rulegen\n\n  \
      # Use another model and keep previous outputs\n  \
      cursor-rulegen --model gpt-4o-mini --backup\n\n  \
      # Only write request.txt\n  \
      cursor-rulegen --dir ./my-project --dry-run"
)]
struct Cli {
    /// Repository directory to scan
    #[arg(short, long, default_value = ".", value_name = "PATH")]
    dir: PathBuf,

    /// Model identifier (overrides OPENAI_MODEL)
    #[arg(short, long, value_name = "MODEL")]
    model: Option<String>,

    /// Base URL of an OpenAI-compatible API (overrides OPENAI_BASE_URL)
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Path to a custom Tera template for the user prompt
    ///
    /// The template must reference `{{ listing }}`. `rules_path`,
    /// `missing_features_path` and `file_count` are also available.
    #[arg(long, value_name = "FILE")]
    template: Option<PathBuf>,

    /// Additional ignore pattern in gitignore syntax (can be used multiple times)
    #[arg(short, long = "ignore", value_name = "PATTERN")]
    ignore: Vec<String>,

    /// Fail if the reply has no missing-features section
    #[arg(long)]
    strict: bool,

    /// Write request.txt only, without contacting the model
    #[arg(long)]
    dry_run: bool,

    /// Back up existing output files before overwriting them
    #[arg(long)]
    backup: bool,

    /// Print a run summary at the end
    #[arg(long)]
    summary: bool,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose)?;

    let mut builder = ConfigBuilder::from_env()
        .root_dir(cli.dir)
        .extra_ignores(cli.ignore)
        .strict_response(cli.strict)
        .dry_run(cli.dry_run)
        .backup_existing(cli.backup);

    if let Some(model) = cli.model {
        builder = builder.model(model);
    }

    if let Some(base_url) = cli.base_url {
        builder = builder.base_url(base_url);
    }

    if let Some(template_path) = cli.template {
        builder = builder.template_path(template_path);
    }

    let config = builder.build().context("Failed to build configuration")?;

    let stats = Pipeline::new(config)
        .context("Failed to create pipeline")?
        .run()
        .context("Generation failed")?;

    if cli.summary {
        stats.print_summary();
    }

    Ok(())
}

fn setup_tracing(verbosity: u8) -> anyhow::Result<()> {
    let filter = match verbosity {
        0 => EnvFilter::new("cursor_rulegen=info"),
        1 => EnvFilter::new("cursor_rulegen=debug"),
        _ => EnvFilter::new("cursor_rulegen=trace"),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false),
        )
        .init();

    Ok(())
}
