use std::fmt;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use glass_core::{
    Config, FetchStatus, OrchestratorEvent, ProviderId, SearchCandidate, WeatherOrchestrator,
};
use inquire::{Confirm, InquireError, Password, Select, Text};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "glass", version, about = "Current weather and a 7-day forecast")]
pub struct Cli {
    /// Log debug output to stderr (overrides RUST_LOG).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a provider and optionally make it the default.
    Configure {
        /// Provider short name: "synthetic" or "openweather".
        provider: String,
    },

    /// List places matching a search text.
    Search {
        /// Place name or part of it.
        text: String,
    },

    /// Show weather for the first place matching a query.
    Show {
        /// Place name or part of it.
        query: String,
    },

    /// Show weather for the device's current location.
    Here,

    /// Search and view weather in a prompt loop.
    Interactive,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure { provider } => configure(&provider),
            Command::Search { text } => search(&Config::load()?, &text).await,
            Command::Show { query } => show(&Config::load()?, &query).await,
            Command::Here => here(&Config::load()?).await,
            Command::Interactive => interactive(&Config::load()?).await,
        }
    }
}

fn configure(provider: &str) -> anyhow::Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load()?;

    if id.needs_api_key() {
        let api_key = Password::new(&format!("{id} API key:"))
            .without_confirmation()
            .with_help_message("Stored in plain text in the glass config file")
            .prompt()
            .context("Failed to read API key")?;

        let api_key = api_key.trim().to_string();
        if api_key.is_empty() {
            bail!("API key must not be empty");
        }
        config.upsert_provider_api_key(id, api_key);
    }

    if config.default_provider_id().ok() != Some(id) {
        let make_default = Confirm::new(&format!("Use {id} as the default provider?"))
            .with_default(true)
            .prompt()
            .context("Failed to read answer")?;
        if make_default {
            config.set_default_provider(id);
        }
    }

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn search(config: &Config, text: &str) -> anyhow::Result<()> {
    let mut orch = WeatherOrchestrator::from_config(config)?;

    match suggestions_for(&mut orch, text).await {
        None => println!("Type at least {} characters to search.", config.search.min_query_len),
        Some(candidates) if candidates.is_empty() => println!("No locations found"),
        Some(candidates) => {
            for candidate in &candidates {
                println!("{}", render::candidate_line(candidate));
            }
        }
    }

    Ok(())
}

async fn show(config: &Config, query: &str) -> anyhow::Result<()> {
    let mut orch = WeatherOrchestrator::from_config(config)?;
    let candidates = suggestions_for(&mut orch, query).await.unwrap_or_default();
    let Some(candidate) = candidates.first() else {
        bail!("No locations found for \"{query}\"");
    };

    orch.select_search_result(candidate);
    orch.settle().await;
    finish(&orch)
}

async fn here(config: &Config) -> anyhow::Result<()> {
    let mut orch = WeatherOrchestrator::from_config(config)?;
    eprintln!("Locating...");
    orch.use_current_location();
    orch.settle().await;
    finish(&orch)
}

/// Print the settled view, or fail with its error message.
fn finish(orch: &WeatherOrchestrator) -> anyhow::Result<()> {
    let view = orch.view();
    if view.status == FetchStatus::Error {
        bail!("{}", view.error_message.as_deref().unwrap_or("Something went wrong"));
    }
    println!("{}", render::view(view));
    Ok(())
}

enum Choice {
    Place(SearchCandidate),
    SearchAgain,
    Back,
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Choice::Place(c) => f.write_str(&render::candidate_line(c)),
            Choice::SearchAgain => f.write_str("Search again"),
            Choice::Back => f.write_str("Back"),
        }
    }
}

enum Action {
    Search,
    Here,
    Quit,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Search => f.write_str("Search for a place"),
            Action::Here => f.write_str("Use my location"),
            Action::Quit => f.write_str("Quit"),
        }
    }
}

async fn interactive(config: &Config) -> anyhow::Result<()> {
    let mut orch = WeatherOrchestrator::from_config(config)?;
    let min_query_len = config.search.min_query_len;

    loop {
        let action = match Select::new("What next?", vec![Action::Search, Action::Here, Action::Quit])
            .prompt()
        {
            Ok(action) => action,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
            Err(e) => return Err(e).context("Prompt failed"),
        };

        match action {
            Action::Quit => break,
            Action::Here => {
                eprintln!("Locating...");
                orch.use_current_location();
            }
            Action::Search => match pick_place(&mut orch, min_query_len).await? {
                Some(candidate) => {
                    orch.select_search_result(&candidate);
                }
                None => continue,
            },
        }

        orch.settle().await;
        let view = orch.view();
        match view.status {
            FetchStatus::Error => {
                eprintln!("Error: {}", view.error_message.as_deref().unwrap_or("unknown"));
            }
            _ => println!("{}\n", render::view(view)),
        }
    }

    Ok(())
}

/// Prompt for a query until the user picks a place, or backs out with `None`.
async fn pick_place(
    orch: &mut WeatherOrchestrator,
    min_query_len: usize,
) -> anyhow::Result<Option<SearchCandidate>> {
    loop {
        let text = match Text::new("Search for a city:").prompt() {
            Ok(text) => text,
            Err(InquireError::OperationCanceled) => return Ok(None),
            Err(e) => return Err(e).context("Prompt failed"),
        };

        let candidates = match suggestions_for(orch, text.trim()).await {
            None => {
                println!("Type at least {min_query_len} characters to search.");
                continue;
            }
            Some(candidates) if candidates.is_empty() => {
                println!("No locations found");
                continue;
            }
            Some(candidates) => candidates,
        };

        let mut choices: Vec<Choice> = candidates.into_iter().map(Choice::Place).collect();
        choices.push(Choice::SearchAgain);
        choices.push(Choice::Back);

        match Select::new("Pick a place:", choices).prompt() {
            Ok(Choice::Place(candidate)) => return Ok(Some(candidate)),
            Ok(Choice::SearchAgain) => continue,
            Ok(Choice::Back) | Err(InquireError::OperationCanceled) => return Ok(None),
            Err(e) => return Err(e).context("Prompt failed"),
        }
    }
}

/// Feed `text` through the debounced search and wait for the resulting list.
///
/// `None` means the text was too short to look up.
async fn suggestions_for(
    orch: &mut WeatherOrchestrator,
    text: &str,
) -> Option<Vec<SearchCandidate>> {
    orch.update_query_text(text);
    if !orch.view().suggestions.loading {
        return None;
    }

    loop {
        if orch.next_event().await == OrchestratorEvent::SuggestionsChanged {
            let list = &orch.view().suggestions;
            if !list.loading {
                return Some(list.candidates.clone());
            }
        }
    }
}
