pub mod batch;
pub mod config;
pub mod fetch;
pub mod github;
pub mod model;
pub mod parse;
pub mod storage;
pub mod ui;
pub mod winget;
pub mod workflow;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{Duration, Utc};
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use colored::Colorize;
use once_cell::sync::Lazy;
use tracing::level_filters::LevelFilter;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use config::{AppPaths, Config};
use fetch::{FetchScheduler, fetch_detail};
use github::{CommitQuery, GithubClient, TokenSource, TokenStore, mask_token, mine_new_packages};
use model::types::{BatchAction, PackageRecord};
use storage::{DetailCache, DetailStore, NoCache, RateLimitStore};
use winget::WingetCli;
use workflow::{BatchFlow, CandidateQuery, FlowOutcome, FlowState, gather_candidates};

/// Exit code when a batch finished with at least one failed item.
pub const EXIT_BATCH_FAILED: u8 = 2;

static LONG_VERSION: Lazy<String> = Lazy::new(|| {
    format!(
        "{} (built {}, {})",
        env!("CARGO_PKG_VERSION"),
        option_env!("VERGEN_BUILD_DATE").unwrap_or("unknown date"),
        option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown target"),
    )
});

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "wgb",
    version,
    long_version = LONG_VERSION.as_str(),
    about = "Batch search, install, upgrade and uninstall on top of winget"
)]
pub struct Cli {
    /// More logging on stderr (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Neither read nor write the package detail cache
    #[arg(long, global = true)]
    pub no_cache: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search packages; each QUERY is a separate search
    Search {
        #[arg(required = true)]
        query: Vec<String>,

        /// Print records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show details for one package id
    Show {
        id: String,

        /// Print the detail record as JSON
        #[arg(long)]
        json: bool,
    },
    /// Search, pick and install packages
    Install {
        #[arg(required = true)]
        query: Vec<String>,

        /// Install every match without prompting
        #[arg(short, long)]
        yes: bool,
    },
    /// Pick and upgrade installed packages that have updates
    Upgrade {
        /// Upgrade everything without prompting
        #[arg(long)]
        all: bool,
    },
    /// Pick and uninstall installed packages matching QUERY
    Uninstall {
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// List packages recently added to the manifest repository
    New {
        /// How far back to look
        #[arg(long, default_value_t = 7)]
        days: u32,

        /// Keep names containing this text (case-insensitive)
        #[arg(long)]
        filter: Option<String>,

        /// Offer the found packages for installation
        #[arg(long)]
        install: bool,

        /// Print candidates as JSON
        #[arg(long, conflicts_with = "install")]
        json: bool,
    },
    /// Manage the GitHub personal access token
    Token {
        #[command(subcommand)]
        action: TokenCommand,
    },
    /// Inspect or clear the package detail cache
    Cache {
        #[command(subcommand)]
        action: CacheCommand,
    },
    /// Generate shell completions to stdout
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate man page to stdout
    Man,
}

#[derive(Subcommand, Debug)]
pub enum TokenCommand {
    /// Store a token (prompted for when omitted)
    Set { token: Option<String> },
    /// Delete the stored token
    Clear,
    /// Show which token is in use and the request budget
    Status,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommand {
    /// Count cached entries
    Stats,
    /// Remove every cached entry
    Clear,
}

/// Install the stderr log subscriber. Safe to call more than once.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    };
    let env_filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .try_init();
}

pub async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "wgb", &mut std::io::stdout());
            Ok(ExitCode::SUCCESS)
        }
        Commands::Man => {
            let cmd = Cli::command();
            let man = clap_mangen::Man::new(cmd);
            let mut out = std::io::stdout();
            man.render(&mut out)?;
            Ok(ExitCode::SUCCESS)
        }
        command => {
            let app = Arc::new(App::load(cli.no_cache)?);
            app.dispatch(command).await
        }
    }
}

/// Resolved settings shared by the commands.
struct App {
    paths: AppPaths,
    config: Config,
    no_cache: bool,
}

impl App {
    fn load(no_cache: bool) -> Result<Self> {
        let paths = AppPaths::resolve()?;
        let config = Config::load(&paths.config_file())?;
        debug!(
            config_dir = %paths.config_dir.display(),
            data_dir = %paths.data_dir.display(),
            "resolved paths"
        );
        Ok(Self {
            paths,
            config,
            no_cache,
        })
    }

    fn package_manager(&self) -> Result<Arc<WingetCli>> {
        let mut cli = WingetCli::locate(self.config.winget_path.as_deref());
        for action in [BatchAction::Install, BatchAction::Upgrade, BatchAction::Uninstall] {
            cli = cli.with_extra_args(action, self.config.extra_args(action)?);
        }
        Ok(Arc::new(cli))
    }

    fn detail_cache(&self) -> Result<DetailCache> {
        self.paths.ensure_data_dir()?;
        Ok(DetailCache::new(self.paths.cache_file()))
    }

    fn detail_store(&self) -> Result<Arc<dyn DetailStore>> {
        if self.no_cache {
            return Ok(Arc::new(NoCache));
        }
        Ok(Arc::new(self.detail_cache()?))
    }

    fn token_store(&self) -> TokenStore {
        TokenStore::new(self.paths.token_file())
    }

    fn rate_limit_store(&self) -> RateLimitStore {
        RateLimitStore::new(self.paths.rate_limit_file())
    }

    /// `new` talks to GitHub on the runtime; everything else spawns
    /// processes, joins fetch workers or prompts, so it runs on the blocking
    /// pool.
    async fn dispatch(self: &Arc<Self>, command: Commands) -> Result<ExitCode> {
        match command {
            Commands::New {
                days,
                filter,
                install,
                json,
            } => self.new_packages(days, filter, install, json).await,
            command => self.blocking(move |app| app.dispatch_blocking(command)).await,
        }
    }

    async fn blocking<F>(self: &Arc<Self>, work: F) -> Result<ExitCode>
    where
        F: FnOnce(&App) -> Result<ExitCode> + Send + 'static,
    {
        let app = Arc::clone(self);
        tokio::task::spawn_blocking(move || work(app.as_ref()))
            .await
            .context("Command task failed")?
    }

    fn dispatch_blocking(&self, command: Commands) -> Result<ExitCode> {
        match command {
            Commands::Search { query, json } => self.search(query, json),
            Commands::Show { id, json } => self.show(&id, json),
            Commands::Install { query, yes } => {
                self.run_flow(BatchAction::Install, CandidateQuery::Search(query), yes)
            }
            Commands::Upgrade { all } => {
                self.run_flow(BatchAction::Upgrade, CandidateQuery::Upgrades, all)
            }
            Commands::Uninstall { query } => {
                self.run_flow(BatchAction::Uninstall, CandidateQuery::Installed(query), false)
            }
            Commands::Token { action } => self.token(action),
            Commands::Cache { action } => self.cache(action),
            // Handled by `run` and `dispatch`.
            Commands::New { .. } | Commands::Completions { .. } | Commands::Man => {
                Ok(ExitCode::SUCCESS)
            }
        }
    }

    fn search(&self, query: Vec<String>, json: bool) -> Result<ExitCode> {
        let pm = self.package_manager()?;
        let progress = ui::spinner(format!("Searching for {}...", query.join(", ")));
        let records = gather_candidates(pm.as_ref(), &CandidateQuery::Search(query));
        progress.finish_and_clear();
        let records = records?;

        if json {
            println!("{}", serde_json::to_string_pretty(&records)?);
        } else if records.is_empty() {
            println!("No packages found.");
        } else {
            print!("{}", ui::format::records_table(&records));
        }
        Ok(ExitCode::SUCCESS)
    }

    fn show(&self, id: &str, json: bool) -> Result<ExitCode> {
        let pm = self.package_manager()?;
        let store = self.detail_store()?;
        let detail = fetch_detail(pm.as_ref(), store.as_ref(), id)
            .with_context(|| format!("Could not fetch details for {id}"))?;
        if json {
            println!("{}", serde_json::to_string_pretty(&detail)?);
        } else {
            print!("{}", ui::format::detail_card(&detail));
        }
        Ok(ExitCode::SUCCESS)
    }

    fn run_flow(
        &self,
        action: BatchAction,
        query: CandidateQuery,
        select_all: bool,
    ) -> Result<ExitCode> {
        let pm = self.package_manager()?;
        let scheduler = FetchScheduler::new(pm.clone(), self.detail_store()?);
        let flow = BatchFlow::new(pm, scheduler, action)
            .with_timeout(self.config.selection_timeout())
            .select_all(select_all);

        let mut prompter = ui::DialoguerPrompter::new(action);
        let mut observer = ui::ConsoleObserver::default();
        let outcome = flow.run(&query, &mut prompter, &mut observer)?;
        Ok(report_flow(&outcome))
    }

    async fn new_packages(
        self: &Arc<Self>,
        days: u32,
        filter: Option<String>,
        install: bool,
        json: bool,
    ) -> Result<ExitCode> {
        self.paths.ensure_data_dir()?;
        let token = self.token_store().resolve().map(|(token, _)| token);
        let github = &self.config.github;
        let client = GithubClient::new(github.repo.clone(), token, self.rate_limit_store())?;
        let query = CommitQuery {
            since: Utc::now() - Duration::days(i64::from(days)),
            per_page: github.per_page,
            max_pages: github.max_pages,
        };

        let progress = ui::spinner(format!("Reading commits from {}...", github.repo));
        let history = client
            .fetch_commits(&query, |page, total| {
                progress.set_message(format!(
                    "Reading commits from {} (page {page}, {total} commits)...",
                    github.repo
                ));
            })
            .await;
        progress.finish_and_clear();
        let history = history?;

        if let Some(stopped) = &history.stopped_early {
            eprintln!("{} {stopped}", "warning:".yellow().bold());
        }
        let candidates = mine_new_packages(&history.commits, filter.as_deref());
        debug!(
            commits = history.commits.len(),
            pages = history.pages,
            candidates = candidates.len(),
            "mined commit history"
        );

        if json {
            println!("{}", serde_json::to_string_pretty(&candidates)?);
            return Ok(ExitCode::SUCCESS);
        }
        if candidates.is_empty() {
            println!("No new packages in the last {days} day(s).");
            return Ok(ExitCode::SUCCESS);
        }
        print!("{}", ui::format::candidates_table(&candidates));

        if !install {
            return Ok(ExitCode::SUCCESS);
        }
        let records = candidates
            .into_iter()
            .map(|c| PackageRecord {
                id: c.name.clone(),
                name: c.name,
                version: c.version,
                available: None,
                source: "winget".into(),
                search_term: "new".into(),
            })
            .collect::<Vec<_>>();
        self.blocking(move |app| {
            app.run_flow(BatchAction::Install, CandidateQuery::Records(records), false)
        })
        .await
    }

    fn token(&self, action: TokenCommand) -> Result<ExitCode> {
        let store = self.token_store();
        match action {
            TokenCommand::Set { token } => {
                let token = match token {
                    Some(token) => token,
                    None => ui::read_secret("GitHub personal access token")?,
                };
                if token.trim().is_empty() {
                    bail!("Refusing to store an empty token");
                }
                store.save(&token)?;
                println!("Token saved to {}", store.path().display());
                eprintln!(
                    "{}",
                    "The token is stored as plain text; protect this file accordingly.".dimmed()
                );
            }
            TokenCommand::Clear => {
                if store.clear()? {
                    println!("Removed {}", store.path().display());
                } else {
                    println!("No stored token.");
                }
                if dotenvy::var("GITHUB_TOKEN").is_ok() {
                    warn!("GITHUB_TOKEN is still set in the environment");
                }
            }
            TokenCommand::Status => {
                let (limit, source) = match store.resolve() {
                    Some((token, TokenSource::Environment)) => {
                        println!("Token: {} (from GITHUB_TOKEN)", mask_token(&token));
                        (storage::rate_limit::AUTHENTICATED_LIMIT, "authenticated")
                    }
                    Some((token, TokenSource::File)) => {
                        println!(
                            "Token: {} (from {})",
                            mask_token(&token),
                            store.path().display()
                        );
                        (storage::rate_limit::AUTHENTICATED_LIMIT, "authenticated")
                    }
                    None => {
                        println!("Token: none");
                        (storage::rate_limit::UNAUTHENTICATED_LIMIT, "unauthenticated")
                    }
                };
                let state = self.rate_limit_store().get();
                println!(
                    "Requests this hour: {}/{limit} ({source}), {} remaining, window resets {}",
                    state.request_count,
                    state.remaining(limit),
                    state.resets_at().format("%Y-%m-%d %H:%M UTC")
                );
            }
        }
        Ok(ExitCode::SUCCESS)
    }

    fn cache(&self, action: CacheCommand) -> Result<ExitCode> {
        let cache = self.detail_cache()?;
        match action {
            CacheCommand::Stats => {
                let stats = cache.stats();
                println!("Cache: {}", cache.path().display());
                println!(
                    "Entries: {} ({} fresh, {} expired)",
                    stats.total, stats.fresh, stats.expired
                );
            }
            CacheCommand::Clear => {
                let removed = cache.clear()?;
                println!("Removed {removed} cached entries.");
            }
        }
        Ok(ExitCode::SUCCESS)
    }
}

/// Print the end of a flow and pick the exit code.
fn report_flow(outcome: &FlowOutcome) -> ExitCode {
    match (&outcome.report, outcome.state) {
        (Some(report), _) => {
            print!("{}", ui::format::batch_summary(report));
            if report.all_succeeded() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_BATCH_FAILED)
            }
        }
        (None, FlowState::Done) => {
            println!("No matching packages.");
            ExitCode::SUCCESS
        }
        (None, _) => {
            println!("Nothing was changed.");
            ExitCode::SUCCESS
        }
    }
}
