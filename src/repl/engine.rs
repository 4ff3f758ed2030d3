use std::time::Duration;

use reedline::{
    ColumnarMenu, Emacs, FileBackedHistory, KeyCode, KeyModifiers, MenuBuilder, Reedline,
    ReedlineEvent, ReedlineMenu, Signal, default_emacs_keybindings,
};
use tracing::{debug, warn};

use crate::cmdline::BuiltinCatalog;
use crate::config::HistoryConfig;
use crate::error::{Result, WildError};
use crate::pipeline::Engine;

use super::completer::WildCompleter;
use super::highlighter::CmdlineHighlighter;
use super::hinter::HistoryHinter;
use super::prompt::WildPrompt;

const COMPLETION_MENU: &str = "completion_menu";

/// REPL engine: a reedline editor whose Tab completion runs the pipeline
pub struct ReplEngine {
    /// Line editor for command input
    editor: Reedline,

    prompt: WildPrompt,

    /// Whether to continue running
    running: bool,
}

impl ReplEngine {
    /// Create a new REPL engine
    ///
    /// # Arguments
    /// * `engine` - Completion engine driving Tab completion
    /// * `wait` - How long a completion request may block the editor
    /// * `history_config` - History configuration
    /// * `color_enabled` - Enable colored prompt, hints and highlighting
    ///
    /// # Returns
    /// * `Result<Self>` - New REPL engine or error
    pub fn new(
        engine: Engine,
        wait: Duration,
        history_config: &HistoryConfig,
        color_enabled: bool,
    ) -> Result<Self> {
        let mut keybindings = default_emacs_keybindings();
        keybindings.add_binding(
            KeyModifiers::NONE,
            KeyCode::Tab,
            ReedlineEvent::UntilFound(vec![
                ReedlineEvent::Menu(COMPLETION_MENU.to_string()),
                ReedlineEvent::MenuNext,
            ]),
        );
        let menu = ColumnarMenu::default().with_name(COMPLETION_MENU);

        let editor = Reedline::create()
            .with_history(Box::new(Self::history(history_config)?))
            .with_completer(Box::new(WildCompleter::new(engine, wait)))
            .with_menu(ReedlineMenu::EngineCompleter(Box::new(menu)))
            .with_edit_mode(Box::new(Emacs::new(keybindings)))
            .with_hinter(Box::new(HistoryHinter::new()))
            .with_highlighter(Box::new(CmdlineHighlighter::new(&BuiltinCatalog, color_enabled)))
            .with_ansi_colors(color_enabled);

        Ok(Self {
            editor,
            prompt: WildPrompt::new("wildline", color_enabled),
            running: true,
        })
    }

    /// Build the history store from configuration
    ///
    /// Falls back to an in-memory history when the file cannot be opened.
    fn history(config: &HistoryConfig) -> Result<FileBackedHistory> {
        if config.persist {
            if let Some(parent) = config.file_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            match FileBackedHistory::with_file(config.max_size, config.file_path.clone()) {
                Ok(history) => return Ok(history),
                Err(e) => warn!(path = %config.file_path.display(), error = %e, "history file unavailable"),
            }
        }
        FileBackedHistory::new(config.max_size)
            .map_err(|e| WildError::Generic(format!("Failed to create history: {}", e)))
    }

    /// Read a single line of input
    ///
    /// # Returns
    /// * `Result<Option<String>>` - Input line or None on EOF / interrupt
    pub fn read_line(&mut self) -> Result<Option<String>> {
        match self.editor.read_line(&self.prompt)? {
            Signal::Success(line) => Ok(Some(line)),
            Signal::CtrlC | Signal::CtrlD => {
                debug!("input closed");
                self.running = false;
                Ok(None)
            }
            #[allow(unreachable_patterns)]
            _ => Ok(None),
        }
    }

    /// Stop the REPL
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Check if REPL is still running
    pub fn is_running(&self) -> bool {
        self.running
    }
}
