use crate::{
    completion::{
        CompletionClient, CompletionRequest, CompletionResult, OpenAiClient, parse_reply,
    },
    config::Config,
    error::{Error, Result},
    flatten::Flattener,
    ignore_set::IgnoreSet,
    repo,
    template::PromptTemplate,
    walker::Walker,
    writer::Writer,
};
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// Statistics collected during a run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStats {
    /// Number of files collected by the walk
    pub total_files: usize,

    /// Size of the flattened text in bytes
    pub flattened_bytes: usize,

    /// Whether the completion request was sent
    pub request_sent: bool,

    /// Whether the reply contained the missing-features section
    pub missing_features_found: bool,

    /// Audit file path
    pub audit_file: String,

    /// Written output files
    pub outputs: Vec<String>,

    /// Total execution time
    pub duration: Duration,

    /// Time spent walking and flattening
    pub scan_duration: Duration,

    /// Time spent waiting for the model
    pub request_duration: Duration,

    /// Time spent writing outputs
    pub write_duration: Duration,
}

impl PipelineStats {
    /// Prints a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n╔═══════════════════════════════════════════════════════╗");
        println!("║               Generation Summary                      ║");
        println!("╠═══════════════════════════════════════════════════════╣");
        println!(
            "║ Files Collected:      {:>8}                        ║",
            self.total_files
        );
        println!(
            "║ Listing Size:         {:>8} bytes                  ║",
            self.flattened_bytes
        );
        println!(
            "║ Request Sent:         {:>8}                        ║",
            if self.request_sent { "yes" } else { "no" }
        );
        println!("║ Audit File:                                           ║");
        println!("║   {}", self.audit_file);
        if !self.outputs.is_empty() {
            println!("║ Outputs:                                              ║");
            for output in &self.outputs {
                println!("║   {output}");
            }
        }
        println!("║                                                       ║");
        println!("║ Timing Breakdown:                                     ║");
        println!(
            "║   - Scanning:         {:>8.2}s                     ║",
            self.scan_duration.as_secs_f64()
        );
        println!(
            "║   - Model request:    {:>8.2}s                     ║",
            self.request_duration.as_secs_f64()
        );
        println!(
            "║   - Writing:          {:>8.2}s                     ║",
            self.write_duration.as_secs_f64()
        );
        println!(
            "║   - Total:            {:>8.2}s                     ║",
            self.duration.as_secs_f64()
        );
        println!("╚═══════════════════════════════════════════════════════╝\n");
    }
}

/// Runs one generation: walk, flatten, ask the model, write the artifacts.
pub struct Pipeline {
    config: Config,
    client: Box<dyn CompletionClient>,
    prompt: PromptTemplate,
    writer: Writer,
}

impl Pipeline {
    /// Creates a pipeline that talks to the configured HTTP endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration validation fails
    /// - The HTTP client or prompt templates cannot be created
    pub fn new(config: Config) -> Result<Self> {
        let client = OpenAiClient::new(&config)?;
        Self::with_client(config, Box::new(client))
    }

    /// Creates a pipeline with an explicitly supplied completion client.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation or template setup fails.
    pub fn with_client(config: Config, client: Box<dyn CompletionClient>) -> Result<Self> {
        config.validate()?;

        let prompt = PromptTemplate::new(&config)?;
        let writer = Writer::new(&config);

        Ok(Self {
            config,
            client,
            prompt,
            writer,
        })
    }

    /// Executes the run and returns statistics.
    ///
    /// # Process
    ///
    /// 1. Check that the root is inside a git repository
    /// 2. Build the ignore set and walk the root
    /// 3. Flatten the files and write the audit file
    /// 4. Send one completion request, even for an empty listing
    /// 5. Split the reply and write both artifacts
    ///
    /// # Errors
    ///
    /// Returns the first error encountered; nothing is rolled back.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use cursor_rulegen::{ConfigBuilder, Pipeline};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let config = ConfigBuilder::from_env().root_dir(".").build()?;
    ///
    /// let stats = Pipeline::new(config)?.run()?;
    /// stats.print_summary();
    /// # Ok(())
    /// # }
    /// ```
    #[instrument(skip(self), fields(root_dir = %self.config.root_dir.display()))]
    pub fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let root = &self.config.root_dir;

        repo::ensure_repository(root)?;

        let scan_start = Instant::now();
        let ignore_set = IgnoreSet::build(root, &self.ignore_patterns())?;
        let files = Walker::new(root, &ignore_set).walk()?;
        info!("Collected {} files", files.len());

        let listing = Flattener::new(root).flatten(&files)?;
        let scan_duration = scan_start.elapsed();

        let audit_path = self.config.audit_path();
        self.writer.write_audit(&audit_path, &listing)?;
        info!(
            "Wrote {} bytes of listing to {}",
            listing.len(),
            audit_path.display()
        );

        let mut stats = PipelineStats {
            total_files: files.len(),
            flattened_bytes: listing.len(),
            request_sent: false,
            missing_features_found: false,
            audit_file: audit_path.display().to_string(),
            outputs: Vec::new(),
            duration: Duration::ZERO,
            scan_duration,
            request_duration: Duration::ZERO,
            write_duration: Duration::ZERO,
        };

        if self.config.dry_run {
            warn!("Dry run mode enabled - skipping model request and outputs");
            stats.duration = start_time.elapsed();
            return Ok(stats);
        }

        let prompt = self.prompt.render(&listing, files.len())?;
        let request = CompletionRequest::new(&self.config.model, prompt);

        info!("Requesting completion from {}...", self.config.model);
        let request_start = Instant::now();
        let reply = self.client.complete(&request)?;
        stats.request_sent = true;
        stats.request_duration = request_start.elapsed();
        info!(
            "Received {} bytes in {:.2}s",
            reply.len(),
            stats.request_duration.as_secs_f64()
        );

        let result = self.parse(&reply)?;
        stats.missing_features_found = result.missing_features.is_some();

        let write_start = Instant::now();
        stats.outputs = self.write_outputs(result)?;
        stats.write_duration = write_start.elapsed();

        info!("✓ Generated {}", stats.outputs.join(" and "));

        stats.duration = start_time.elapsed();
        Ok(stats)
    }

    /// Built-in extras: the run's own artifacts plus configured patterns.
    fn ignore_patterns(&self) -> Vec<String> {
        let mut patterns = self.config.artifact_ignores();
        patterns.extend(self.config.extra_ignores.iter().cloned());
        patterns
    }

    fn parse(&self, reply: &str) -> Result<CompletionResult> {
        let missing_label = self.config.missing_features_label();
        let result = parse_reply(reply, &self.config.rules_label(), &missing_label);

        if result.missing_features.is_none() {
            if self.config.strict_response {
                return Err(Error::malformed_response(missing_label));
            }
            warn!(
                "Model reply did not contain a '{}' section; writing it empty",
                missing_label
            );
        }

        Ok(result)
    }

    fn write_outputs(&self, result: CompletionResult) -> Result<Vec<String>> {
        self.writer.ensure_output_dir()?;

        let rules_path = self.config.rules_path();
        self.writer.write_artifact(&rules_path, &result.rules)?;

        let missing_path = self.config.missing_features_path();
        let missing = result.missing_features.unwrap_or_default();
        self.writer.write_artifact(&missing_path, &missing)?;

        Ok(vec![
            rules_path.display().to_string(),
            missing_path.display().to_string(),
        ])
    }
}
