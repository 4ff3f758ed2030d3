//! Command-line interface for wildline
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and validation
//! - Building the completion engine from configuration and arguments
//! - The one-shot subcommands (`version`, `completion`, `config`, `complete`)

pub mod completion;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::completion::{
    FsSource, JobRunner, PipelineOptions, StaticSource, complete_blocking, default_pipeline,
};
use crate::config::{Config, LogLevel};
use crate::error::{ConfigError, PipelineError, Result, WildError};
use crate::pipeline::Engine;

/// How long `complete` waits when no deadline is configured
const ONE_SHOT_WAIT: Duration = Duration::from_secs(5);

/// Wildline - command-line completion pipelines
#[derive(Parser, Debug)]
#[command(
    name = "wildline",
    version,
    about = "Command-line completion pipelines",
    long_about = "An interactive command line with Vim-style completion: command names,
file arguments, substitute patterns and buffer search, driven by composable
completion pipelines."
)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Directory file arguments are completed against
    #[arg(long, value_name = "DIR")]
    pub dir: Option<PathBuf>,

    /// File whose lines are searched by pattern completion
    #[arg(long, value_name = "FILE")]
    pub buffer: Option<PathBuf>,

    /// Name of a user-defined command (repeatable)
    #[arg(long = "user-command", value_name = "NAME")]
    pub user_commands: Vec<String>,

    /// Match candidates as subsequences instead of prefixes
    #[arg(long)]
    pub fuzzy: bool,

    /// Deadline for a completion run in milliseconds (0 = none)
    #[arg(long, value_name = "MS")]
    pub deadline: Option<u64>,

    /// Disable colored output
    #[arg(long = "no-color")]
    pub no_color: bool,

    /// Quiet mode (minimal output)
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Verbose mode (detailed logging)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Very verbose mode (debug logging)
    #[arg(long = "vv")]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands for wildline
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show version information
    Version,

    /// Generate shell completion script
    Completion {
        /// Shell type (bash, zsh, fish, powershell)
        #[arg(value_name = "SHELL")]
        shell: String,
    },

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration file
        #[arg(long)]
        validate: bool,
    },

    /// Print the candidates for a command line as JSON
    Complete {
        /// Command line to complete, cursor at the end
        #[arg(value_name = "LINE", allow_hyphen_values = true)]
        line: String,

        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Loaded configuration
    config: Config,
}

impl CliInterface {
    /// Create a new CLI interface from the process arguments
    ///
    /// # Returns
    /// * `Result<Self>` - New CLI interface or error
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Create a CLI interface from already parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Load configuration from file and merge with arguments
    ///
    /// # Arguments
    /// * `args` - Command-line arguments
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded configuration or error
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = Config::load(args.config_file.as_deref())?;

        // Validate loaded configuration
        if let Err(e) = config.validate() {
            eprintln!("Warning: Configuration validation failed: {}", e);
            eprintln!("Using default configuration instead.");
            config = Config::default();
        }

        // Apply CLI arguments to override config values
        Self::apply_args_to_config(&mut config, args);

        Ok(config)
    }

    /// Get the loaded configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the CLI arguments
    pub fn args(&self) -> &CliArgs {
        &self.args
    }

    /// Path of the configuration file in use (from args or default)
    pub fn config_path(&self) -> PathBuf {
        self.args
            .config_file
            .clone()
            .unwrap_or_else(Config::default_path)
    }

    /// Apply CLI arguments to configuration
    ///
    /// Overrides configuration values with CLI arguments where provided
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        Self::apply_logging_args(config, args);
        Self::apply_completion_args(config, args);
    }

    /// Apply logging-related CLI arguments to configuration
    fn apply_logging_args(config: &mut Config, args: &CliArgs) {
        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };
    }

    /// Apply completion-related CLI arguments to configuration
    fn apply_completion_args(config: &mut Config, args: &CliArgs) {
        if args.fuzzy {
            config.completion.fuzzy_filter = true;
        }
        if let Some(deadline) = args.deadline {
            config.engine.deadline_ms = deadline;
        }
    }

    /// Lines of the `--buffer` file, empty when none was given
    fn buffer_lines(&self) -> Result<Vec<String>> {
        match &self.args.buffer {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                Ok(text.lines().map(str::to_string).collect())
            }
            None => Ok(Vec::new()),
        }
    }

    /// Options for the built-in pipelines
    ///
    /// File listing moves to the background when called inside a tokio
    /// runtime.
    pub fn pipeline_options(&self) -> Result<PipelineOptions> {
        let source = StaticSource::with_editor_defaults()
            .with_user_commands(self.args.user_commands.clone())
            .with_lines(self.buffer_lines()?);

        let files = match &self.args.dir {
            Some(dir) => FsSource::new(dir),
            None => FsSource::current_dir()?,
        };

        let opts = PipelineOptions::from_config(&self.config.completion, Arc::new(source), files)
            .map_err(|e| ConfigError::InvalidValue {
                field: "completion.ignore".to_string(),
                value: e.to_string(),
            })?;

        Ok(match JobRunner::try_current() {
            Some(jobs) => opts.with_jobs(Arc::new(jobs)),
            None => opts,
        })
    }

    /// Completion engine as configured
    pub fn build_engine(&self) -> Result<Engine> {
        let engine = Engine::new().with_deadline(self.config.deadline());
        if !self.config.completion.use_default_pipeline {
            debug!("default pipeline disabled");
            return Ok(engine);
        }
        let opts = self.pipeline_options()?;
        Ok(engine.with_default(move || default_pipeline(&opts)))
    }

    /// Handle subcommands
    ///
    /// # Returns
    /// * `Result<bool>` - True if subcommand was handled, false to continue
    pub async fn handle_subcommand(&self) -> Result<bool> {
        match &self.args.command {
            Some(Commands::Version) => {
                self.show_version();
                Ok(true)
            }
            Some(Commands::Completion { shell }) => {
                completion::generate_completion(shell)?;
                Ok(true)
            }
            Some(Commands::Config { show, validate }) => {
                self.handle_config_command(*show, *validate)?;
                Ok(true)
            }
            Some(Commands::Complete { line, pretty }) => {
                self.complete_line(line, *pretty)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Show version information
    fn show_version(&self) {
        println!("wildline version {}", env!("CARGO_PKG_VERSION"));
        println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
    }

    /// Handle config subcommand
    fn handle_config_command(&self, show: bool, validate: bool) -> Result<()> {
        if validate {
            self.validate_config_file(&self.config_path());
        }

        if show {
            self.show_config()?;
        }

        Ok(())
    }

    /// Validate configuration file
    fn validate_config_file(&self, path: &Path) {
        println!("Validating configuration file: {}", path.display());

        if !path.exists() {
            println!("Configuration file does not exist, defaults apply");
            return;
        }

        match Config::from_file(path) {
            Ok(config) => match config.validate() {
                Ok(_) => println!("Configuration is valid"),
                Err(e) => println!("Configuration validation failed: {}", e),
            },
            Err(e) => println!("Failed to load configuration: {}", e),
        }
    }

    /// Show effective configuration
    fn show_config(&self) -> Result<()> {
        println!("# Configuration file: {}", self.config_path().display());
        println!();
        println!("{}", self.config.to_toml()?);
        Ok(())
    }

    /// Print the candidates for `line` as JSON
    fn complete_line(&self, line: &str, pretty: bool) -> Result<()> {
        let mut engine = self.build_engine()?;
        let wait = self.config.deadline().unwrap_or(ONE_SHOT_WAIT);

        let candidates = match complete_blocking(&mut engine, line, wait) {
            Ok(candidates) => candidates,
            Err(WildError::Pipeline(PipelineError::NoResult)) => Vec::new(),
            Err(e) => {
                warn!(line, error = %e, "completion failed");
                return Err(e);
            }
        };

        let json = if pretty {
            serde_json::to_string_pretty(&candidates)
        } else {
            serde_json::to_string(&candidates)
        }
        .map_err(|e| WildError::Generic(format!("Failed to encode candidates: {}", e)))?;
        println!("{}", json);
        Ok(())
    }

    /// Print banner with version info
    pub fn print_banner(&self) {
        if !self.args.quiet {
            println!("wildline {}", env!("CARGO_PKG_VERSION"));
            println!("Tab completes, Ctrl-D exits.");
        }
    }
}
