//! dialoguer prompts and console progress output.

use std::io::IsTerminal;

use colored::Colorize;
use dialoguer::{MultiSelect, Password, Select, theme::ColorfulTheme};
use indicatif::ProgressBar;

use super::format::{detail_card, records_table};
use super::progress::spinner;
use crate::batch::{BatchEvent, ItemStatus};
use crate::model::types::{BatchAction, PackageDetail, PackageRecord};
use crate::workflow::{FlowObserver, FlowState, PromptError, Prompter, Review};

const REVIEW_CHOICES: [&str; 3] = ["Proceed", "Back to selection", "Cancel"];

/// Prompts on the controlling terminal.
pub struct DialoguerPrompter {
    theme: ColorfulTheme,
    action: BatchAction,
}

impl DialoguerPrompter {
    pub fn new(action: BatchAction) -> Self {
        Self {
            theme: ColorfulTheme::default(),
            action,
        }
    }

    fn ensure_terminal() -> Result<(), PromptError> {
        if std::io::stdin().is_terminal() && std::io::stderr().is_terminal() {
            Ok(())
        } else {
            Err(PromptError::Unavailable)
        }
    }
}

impl Prompter for DialoguerPrompter {
    fn select(
        &mut self,
        title: &str,
        choices: &[String],
        defaults: &[bool],
    ) -> Result<Vec<usize>, PromptError> {
        Self::ensure_terminal()?;

        eprintln!();
        eprintln!("{}", title.bold().underline());
        eprintln!(
            "{}",
            "[space] toggle  [a] all  [enter] confirm  [esc] quit".dimmed()
        );
        eprintln!();

        MultiSelect::with_theme(&self.theme)
            .items(choices)
            .defaults(defaults)
            .interact_opt()
            .map_err(|e| PromptError::Io(e.to_string()))?
            .ok_or(PromptError::Cancelled)
    }

    fn review(&mut self, details: &[&PackageDetail]) -> Result<Review, PromptError> {
        Self::ensure_terminal()?;

        eprintln!();
        eprintln!(
            "{}",
            format!("About to {} {} package(s):", self.action.verb(), details.len()).bold()
        );
        for detail in details {
            eprintln!();
            eprint!("{}", detail_card(detail));
        }
        eprintln!();

        let choice = Select::with_theme(&self.theme)
            .with_prompt("Continue?")
            .items(&REVIEW_CHOICES)
            .default(0)
            .interact_opt()
            .map_err(|e| PromptError::Io(e.to_string()))?;
        Ok(match choice {
            Some(0) => Review::Proceed,
            Some(1) => Review::Back,
            _ => Review::Cancel,
        })
    }
}

/// Hidden input, used for `token set` without an argument.
pub fn read_secret(prompt: &str) -> Result<String, PromptError> {
    DialoguerPrompter::ensure_terminal()?;
    Password::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .interact()
        .map_err(|e| PromptError::Io(e.to_string()))
}

/// Prints flow progress to the terminal.
#[derive(Default)]
pub struct ConsoleObserver {
    searching: Option<ProgressBar>,
}

impl FlowObserver for ConsoleObserver {
    fn on_state(&mut self, state: FlowState) {
        if let Some(progress) = self.searching.take() {
            progress.finish_and_clear();
        }
        if state == FlowState::Searching {
            self.searching = Some(spinner("Querying winget..."));
        }
    }

    fn on_listing(&mut self, records: &[PackageRecord]) {
        eprintln!(
            "{}",
            "No interactive terminal; listing candidates instead.".yellow()
        );
        print!("{}", records_table(records));
    }

    fn on_placeholders(&mut self, ids: &[String]) {
        eprintln!(
            "{} details not ready for: {}",
            "warning:".yellow().bold(),
            ids.join(", ")
        );
    }

    fn on_batch_event(&mut self, event: BatchEvent<'_>) {
        match event {
            BatchEvent::Starting { index, total, id } => {
                eprintln!("{} {}", format!("[{}/{}]", index + 1, total).dimmed(), id.bold());
            }
            BatchEvent::Finished { outcome, .. } => match &outcome.status {
                ItemStatus::Succeeded => eprintln!("  {} {}", "✓".green(), outcome.id),
                ItemStatus::Failed { exit_code } => {
                    eprintln!("  {} {} (exit code {exit_code})", "✗".red(), outcome.id)
                }
                ItemStatus::Error { message } => {
                    eprintln!("  {} {} ({message})", "✗".red(), outcome.id)
                }
            },
        }
    }
}
