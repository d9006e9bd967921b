mod app;
mod config;
mod console;
mod controller;
mod process;
mod rows;
mod search;
mod status;
mod tree;
mod ui;

use std::fs::File;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{self, Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use app::AppContext;
use config::{Config, PkexecMode};
use console::CommandSource;
use search::SearchOptions;
use status::TabKind;

const TICK: Duration = Duration::from_millis(100);

#[derive(Debug, Parser)]
#[command(
    name = "armorview",
    about = "Inspect AppArmor profiles, confined processes and audit logs",
    version
)]
pub struct Cli {
    /// search text applied to every tab on startup.
    #[arg(value_name = "FILTER")]
    pub filter: Option<String>,

    /// tab shown on startup.
    #[arg(long = "tab", value_enum, default_value_t = TabKind::Processes)]
    pub tab: TabKind,

    /// periodic refresh of the current tab in milliseconds, 0 disables it.
    #[arg(long = "refresh-rate", value_name = "ms", default_value_t = 5_000)]
    pub refresh_rate: u64,

    /// treat the search text as a regular expression.
    #[arg(long = "regex")]
    pub regex: bool,

    /// make the search case sensitive.
    #[arg(long = "match-case")]
    pub match_case: bool,

    /// only match whole words.
    #[arg(long = "whole-word")]
    pub whole_word: bool,

    /// fuzzy search instead of substring search.
    #[arg(long = "fuzzy")]
    pub fuzzy: bool,

    /// wrap privileged commands in pkexec.
    #[arg(long = "pkexec", value_enum, default_value_t = PkexecMode::Auto)]
    pub pkexec: PkexecMode,

    /// write logs to this file.
    #[arg(long = "log-file", value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// log verbosity, repeat for more.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl From<Cli> for Config {
    fn from(args: Cli) -> Self {
        Config {
            initial_tab: args.tab,
            initial_filter: args.filter,
            search_options: SearchOptions {
                use_regex: args.regex,
                match_case: args.match_case,
                whole_word: args.whole_word,
                fuzzy: args.fuzzy,
            },
            refresh_rate_ms: args.refresh_rate,
            pkexec: args.pkexec,
            log_file: args.log_file,
            verbosity: args.verbose,
        }
    }
}

fn init_logging(config: &Config) -> Result<()> {
    let Some(path) = &config.log_file else {
        return Ok(());
    };
    let level = match config.verbosity {
        0 => simplelog::LevelFilter::Info,
        1 => simplelog::LevelFilter::Debug,
        _ => simplelog::LevelFilter::Trace,
    };
    let mut lcfg = simplelog::ConfigBuilder::new();
    lcfg.set_location_level(simplelog::LevelFilter::Off)
        .set_target_level(simplelog::LevelFilter::Off)
        .set_thread_level(simplelog::LevelFilter::Off);
    let file = File::create(path)
        .with_context(|| format!("failed to create log file {}", path.display()))?;
    simplelog::WriteLogger::init(level, lcfg.build(), file)
        .context("failed to initialize logger")?;
    Ok(())
}

fn run(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut AppContext) -> Result<()> {
    loop {
        app.pump();
        terminal.draw(|frame| ui::render(frame, app))?;

        if event::poll(TICK)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && app.handle_input(key)? {
                    return Ok(());
                }
            }
        }
        app.tick(Instant::now());
    }
}

fn main() -> Result<()> {
    let config = Config::from(Cli::parse());
    init_logging(&config)?;
    log::info!("starting armorview: {config:?}");

    let mut app = AppContext::new(&config, CommandSource::new(config.pkexec));

    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;

    let result = run(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_maps_into_config() {
        let cli = Cli::try_parse_from([
            "armorview",
            "--tab",
            "logs",
            "--regex",
            "--whole-word",
            "--pkexec",
            "never",
            "--refresh-rate",
            "0",
            "-vv",
            "nginx",
        ])
        .unwrap();
        let config = Config::from(cli);

        assert_eq!(config.initial_tab, TabKind::Logs);
        assert_eq!(config.initial_filter.as_deref(), Some("nginx"));
        assert!(config.search_options.use_regex);
        assert!(config.search_options.whole_word);
        assert!(!config.search_options.fuzzy);
        assert_eq!(config.pkexec, PkexecMode::Never);
        assert_eq!(config.refresh_rate_ms, 0);
        assert_eq!(config.verbosity, 2);
    }

    #[test]
    fn test_cli_defaults() {
        let config = Config::from(Cli::try_parse_from(["armorview"]).unwrap());
        assert_eq!(config.initial_tab, TabKind::Processes);
        assert_eq!(config.refresh_rate_ms, 5_000);
        assert_eq!(config.pkexec, PkexecMode::Auto);
        assert!(config.log_file.is_none());
    }
}
