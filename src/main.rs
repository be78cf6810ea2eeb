// Module-specific lints configuration
#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError, debug, info, warn};
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};

use subtrans::app_config::{self, Config};
use subtrans::commands::{BatchSubtitlesCommand, CommandContext, CommandQueue, QueueEvent};
use subtrans::subtitles::{DocumentHandle, SubtitleDocument, SubtitleLine};
use subtrans::translation::TranslationParser;

/// CLI Wrapper for LogLevel to implement ValueEnum
#[derive(Debug, Clone, ValueEnum)]
enum CliLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<CliLogLevel> for app_config::LogLevel {
    fn from(cli_level: CliLogLevel) -> Self {
        match cli_level {
            CliLogLevel::Error => app_config::LogLevel::Error,
            CliLogLevel::Warn => app_config::LogLevel::Warn,
            CliLogLevel::Info => app_config::LogLevel::Info,
            CliLogLevel::Debug => app_config::LogLevel::Debug,
            CliLogLevel::Trace => app_config::LogLevel::Trace,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Group lines into scenes and batches and print the partition
    Batch {
        /// JSON array of lines ({number, start_ms, end_ms, text})
        #[arg(value_name = "LINES_JSON")]
        lines: PathBuf,
    },

    /// Parse a translation response against a list of source lines
    Parse {
        /// JSON array of source lines
        #[arg(value_name = "LINES_JSON")]
        lines: PathBuf,

        /// Text file holding the backend response
        #[arg(value_name = "RESPONSE")]
        response: PathBuf,
    },

    /// Generate shell completions for subtrans
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// subtrans - subtitle document batching and response parsing
#[derive(Parser, Debug)]
#[command(name = "subtrans")]
#[command(version)]
#[command(about = "Subtitle batching and translation-response tools")]
#[command(long_about = "subtrans groups subtitle lines into scenes and batches and parses translation responses.

EXAMPLES:
    subtrans batch lines.json                   # Print the scene/batch partition
    subtrans parse lines.json response.txt      # Parse a response for these lines
    subtrans -c conf.json batch lines.json      # Use custom batching thresholds
    subtrans completions bash > subtrans.bash   # Generate bash completions

CONFIGURATION:
    Settings are read from conf.json by default. Defaults are used when the
    file does not exist.")]
struct CommandLineOptions {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, default_value = "conf.json", global = true)]
    config_path: PathBuf,

    /// Set logging level
    #[arg(short, long, value_enum, global = true)]
    log_level: Option<CliLogLevel>,
}

// @struct: Custom logger implementation
struct CustomLogger {
    level: LevelFilter,
}

impl CustomLogger {
    // @initializes: Global logger
    fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(CustomLogger { level: LevelFilter::Trace }))?;
        log::set_max_level(level);
        Ok(())
    }

    // @returns: ANSI colour for log level
    fn color_for_level(level: Level) -> &'static str {
        match level {
            Level::Error => "\x1B[1;31m",
            Level::Warn => "\x1B[1;33m",
            Level::Info => "\x1B[1;32m",
            Level::Debug => "\x1B[1;36m",
            Level::Trace => "\x1B[1;35m",
        }
    }
}

impl Log for CustomLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let now = chrono::Local::now().format("%H:%M:%S.%3f");
            let _ = writeln!(
                std::io::stderr(),
                "{}{} {:<5} {}\x1B[0m",
                Self::color_for_level(record.level()),
                now,
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Info until the config is loaded
    CustomLogger::init(LevelFilter::Info)?;

    let cli = CommandLineOptions::parse();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = CommandLineOptions::command();
        generate(shell, &mut cmd, "subtrans", &mut std::io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config_path, cli.log_level.clone())?;
    log::set_max_level((&config.log_level).into());

    match cli.command {
        Commands::Batch { lines } => run_batch(&lines, config).await,
        Commands::Parse { lines, response } => run_parse(&lines, &response, &config),
        Commands::Completions { .. } => Ok(()),
    }
}

fn load_config(path: &Path, log_level: Option<CliLogLevel>) -> Result<Config> {
    let mut config = if path.exists() {
        Config::from_file(path)?
    } else {
        debug!("Config file not found at {:?}, using defaults", path);
        Config::default()
    };

    if let Some(log_level) = log_level {
        config.log_level = log_level.into();
    }
    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

fn read_lines(path: &Path) -> Result<Vec<SubtitleLine>> {
    let file = File::open(path).with_context(|| format!("Failed to open lines file: {:?}", path))?;
    let lines: Vec<SubtitleLine> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse lines file: {:?}", path))?;
    if lines.is_empty() {
        return Err(anyhow!("No lines in {:?}", path));
    }
    Ok(lines)
}

async fn run_batch(path: &Path, config: Config) -> Result<()> {
    let lines = read_lines(path)?;
    info!("Batching {} lines", lines.len());

    let queue_config = config.queue.clone();
    let document = DocumentHandle::new(SubtitleDocument::default());
    let context = CommandContext::new(document.clone(), config);
    let (queue, mut events) = CommandQueue::new(context, &queue_config);

    queue.submit(Box::new(BatchSubtitlesCommand::new(lines)))?;
    queue.wait_idle().await?;
    queue.stop().await?;

    while let Ok(event) = events.try_recv() {
        if let QueueEvent::Failed { error, .. } = event {
            return Err(anyhow!(error));
        }
    }

    document.read(|doc| {
        for scene in &doc.scenes {
            println!(
                "Scene {}: {} batches, {} lines",
                scene.number,
                scene.size(),
                scene.line_count()
            );
            for batch in &scene.batches {
                println!(
                    "  Batch {}: lines {}-{} ({} lines)",
                    batch.number,
                    batch.first_line_number().unwrap_or(0),
                    batch.last_line_number().unwrap_or(0),
                    batch.size()
                );
            }
        }
    });
    Ok(())
}

fn run_parse(lines_path: &Path, response_path: &Path, config: &Config) -> Result<()> {
    let lines = read_lines(lines_path)?;
    let response = std::fs::read_to_string(response_path)
        .with_context(|| format!("Failed to read response file: {:?}", response_path))?;

    let result = TranslationParser::new(config.parser.clone()).parse(&response, &lines);

    for line in &result.translated {
        let marker = if result.fuzzy_matches.contains(&line.number) { "~" } else { " " };
        println!("{}#{} {}", marker, line.number, line.text);
    }
    if !result.unmatched.is_empty() {
        let numbers: Vec<String> = result.unmatched.iter().map(|l| l.number.to_string()).collect();
        warn!("Unmatched lines: {}", numbers.join(", "));
    }
    for error in &result.errors {
        println!("error: {}", error);
    }
    if let Some(summary) = &result.summary {
        println!("summary: {}", summary);
    }
    if let Some(scene) = &result.scene_summary {
        println!("scene: {}", scene);
    }
    Ok(())
}
