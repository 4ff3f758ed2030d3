//! Prompt for the wildline command line

use std::borrow::Cow;

use nu_ansi_term::{Color, Style};
use reedline::{Prompt, PromptEditMode, PromptHistorySearch, PromptHistorySearchStatus};

/// Command-line prompt, `wildline:` styled when colors are on
pub struct WildPrompt {
    /// Label shown before the colon
    label: String,
    /// Whether to style the prompt
    color_enabled: bool,
}

impl WildPrompt {
    /// Create a new prompt
    ///
    /// # Arguments
    /// * `label` - Text shown before the `:` indicator
    /// * `color_enabled` - Whether to style the label
    pub fn new(label: impl Into<String>, color_enabled: bool) -> Self {
        Self {
            label: label.into(),
            color_enabled,
        }
    }

    fn style(&self) -> Style {
        if self.color_enabled {
            Color::Green.bold()
        } else {
            Style::default()
        }
    }
}

impl Default for WildPrompt {
    fn default() -> Self {
        Self::new("wildline", true)
    }
}

impl Prompt for WildPrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        self.style().paint(format!("{}> ", self.label)).to_string().into()
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        "".into()
    }

    fn render_prompt_indicator(&self, _prompt_mode: PromptEditMode) -> Cow<'_, str> {
        "".into()
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        "... ".into()
    }

    /// Render the history search prompt
    ///
    /// # Arguments
    /// * `history_search` - History search state
    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<'_, str> {
        let prefix = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "failing ",
        };

        format!("({}reverse-search: {}) ", prefix, history_search.term).into()
    }
}
