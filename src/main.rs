//! wildline - command-line completion pipelines
//!
//! An interactive command line with Vim-style completion of command names,
//! file arguments, substitute patterns and buffer search.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode
//! wildline --dir . --buffer notes.txt
//!
//! # One-shot completion as JSON
//! wildline complete ':e src/'
//! ```

use nu_ansi_term::Color;
use tracing::Level;

use wildline::cli::CliInterface;
use wildline::error::Result;
use wildline::repl::{LineAction, ReplEngine, evaluate};

/// Application entry point
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Main application logic
///
/// This function orchestrates the application startup:
/// 1. Parse command-line arguments
/// 2. Load configuration
/// 3. Initialize logging
/// 4. Handle subcommands or start the interactive command line
async fn run() -> Result<()> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli);

    // Handle subcommands (version, completion, config, complete)
    if cli.handle_subcommand().await? {
        return Ok(());
    }

    cli.print_banner();

    run_interactive_mode(&cli)
}

/// Run the interactive command line
fn run_interactive_mode(cli: &CliInterface) -> Result<()> {
    let color = !cli.args().no_color;
    let engine = cli.build_engine()?;
    let mut repl = ReplEngine::new(engine, cli.config().wait(), &cli.config().history, color)?;

    while repl.is_running() {
        let Some(line) = repl.read_line()? else {
            break;
        };

        match evaluate(&line) {
            LineAction::Empty => continue,
            LineAction::Quit => repl.stop(),
            LineAction::Echo(text) if color => println!("{}", Color::DarkGray.paint(text)),
            LineAction::Echo(text) => println!("{}", text),
        }
    }

    if !cli.args().quiet {
        println!("Goodbye!");
    }
    Ok(())
}

/// Initialize logging system based on verbosity level
///
/// # Arguments
/// * `cli` - CLI interface with verbosity settings
fn initialize_logging(cli: &CliInterface) {
    let level = if cli.args().very_verbose {
        Level::TRACE
    } else if cli.args().verbose {
        Level::DEBUG
    } else {
        cli.config().logging.level.to_tracing_level()
    };

    // Logs go to stderr so `complete` output stays parseable
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr);

    if cli.config().logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }
}
