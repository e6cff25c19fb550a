use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use sports_predictor::baseball_scoring::{self, GameContext};
use sports_predictor::batch::{self, BatchRequest};
use sports_predictor::config::Config;
use sports_predictor::error::PredictError;
use sports_predictor::espn::EspnClient;
use sports_predictor::http_client::http_client;
use sports_predictor::league::League;
use sports_predictor::pitchers::{self, PitcherStats};
use sports_predictor::sport::Sport;
use sports_predictor::{api, extract, football_scoring, injuries, logging, ml, store, weather};

/// Box-score ingestion and matchup prediction for NFL, MLB and college football.
#[derive(Parser, Debug)]
#[command(name = "sports_predictor", version, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML config file (defaults to $SPORTS_CONFIG, then built-in defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Override the season year
    #[arg(long, global = true)]
    season: Option<i32>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scrape every completed game of the season
    Extract {
        #[arg(short, long, default_value = "nfl")]
        sport: Sport,
    },

    /// Re-scrape from the last stored week or date
    Update {
        #[arg(short, long, default_value = "nfl")]
        sport: Sport,
    },

    /// Refresh the injury report
    Injuries {
        #[arg(short, long, default_value = "nfl")]
        sport: Sport,
    },

    /// Predict one game (prompts for missing team names)
    Predict {
        #[arg(short, long, default_value = "nfl")]
        sport: Sport,
        #[arg(long)]
        home: Option<String>,
        #[arg(long)]
        away: Option<String>,
        #[arg(long)]
        neutral: bool,
        /// Use the trained NFL model instead of the heuristic scorer
        #[arg(long)]
        ml: bool,
        /// Baseball: starter from the sample pitcher table
        #[arg(long)]
        home_pitcher: Option<String>,
        #[arg(long)]
        away_pitcher: Option<String>,
        /// Baseball: ESPN athlete id for a live starter lookup
        #[arg(long)]
        home_pitcher_id: Option<String>,
        #[arg(long)]
        away_pitcher_id: Option<String>,
        /// Baseball: skip the weather lookup
        #[arg(long)]
        no_weather: bool,
        /// Print JSON instead of the narrated report
        #[arg(long)]
        json: bool,
    },

    /// Predict every game of a football week
    Batch {
        #[arg(short, long, default_value = "nfl")]
        sport: Sport,
        #[arg(short, long)]
        week: u32,
        /// preseason, regular or postseason
        #[arg(long, default_value = "regular")]
        season_type: String,
        #[arg(long)]
        ml: bool,
    },

    /// Train and save the NFL win-probability model
    Train,

    /// Show what is stored on disk
    Status {
        #[arg(short, long, default_value = "nfl")]
        sport: Sport,
    },

    /// List stored team names
    Teams {
        #[arg(short, long, default_value = "nfl")]
        sport: Sport,
    },

    /// Run the HTTP API
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err:#}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = logging::init(&config.logging) {
        eprintln!("warning: {err:#}");
    }
    match run(cli.command, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "command failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(season) = cli.season {
        config.season = season;
    }
    Ok(config)
}

fn run(command: Commands, mut config: Config) -> Result<()> {
    match command {
        Commands::Extract { sport } => {
            let client = EspnClient::new(&config)?;
            let summary = extract::run_full(&client, &config, sport)?;
            print_extract(&summary);
        }
        Commands::Update { sport } => {
            let client = EspnClient::new(&config)?;
            let summary = extract::run_update(&client, &config, sport)?;
            print_extract(&summary);
        }
        Commands::Injuries { sport } => {
            let client = EspnClient::new(&config)?;
            let paths = config.paths(sport);
            let summary = injuries::refresh(&client, &paths)?;
            println!(
                "{} injuries across {} teams written to {}",
                summary.total_injuries,
                summary.teams_with_data,
                paths.injuries_report.display()
            );
            for team in &summary.top_impacted {
                println!(
                    "  {:30} {:>3} injuries  impact {:.1}",
                    team.team, team.injury_count, team.impact_score
                );
            }
        }
        Commands::Predict {
            sport,
            home,
            away,
            neutral,
            ml,
            home_pitcher,
            away_pitcher,
            home_pitcher_id,
            away_pitcher_id,
            no_weather,
            json,
        } => {
            let home = team_or_prompt(home, "Home team")?;
            let away = team_or_prompt(away, "Away team")?;
            let pitchers = PitcherArgs {
                home_name: home_pitcher,
                away_name: away_pitcher,
                home_id: home_pitcher_id,
                away_id: away_pitcher_id,
            };
            predict(&config, sport, &home, &away, neutral, ml, &pitchers, !no_weather, json)?;
        }
        Commands::Batch {
            sport,
            week,
            season_type,
            ml,
        } => {
            let request = BatchRequest {
                sport,
                week,
                phase: batch::parse_season_type(&season_type)?,
                use_ml: ml,
            };
            let client = EspnClient::new(&config)?;
            let result = batch::run(&client, &config, &request)?;
            print!("{}", batch::render_summary(&result));
            for path in [&result.summary.report_file, &result.summary.workbook_file]
                .into_iter()
                .flatten()
            {
                println!("Saved {}", path.display());
            }
        }
        Commands::Train => {
            let paths = config.paths(Sport::Nfl);
            let teams = store::load_football(&paths.games)?;
            if teams.is_empty() {
                return Err(PredictError::NoData(Sport::Nfl.label().to_string()).into());
            }
            let league = League::new(Sport::Nfl, &teams);
            let artifact = ml::train(&league, &config.model)?;
            ml::save(&paths.model, &artifact)?;
            print!("{}", ml::render_report(&artifact.report));
            println!("\nModel saved to {}", paths.model.display());
        }
        Commands::Status { sport } => {
            let paths = config.paths(sport);
            let games = store::read_games(&paths.games)?;
            let file = store::file_status(&paths.games);
            println!("{} data: {}", sport.label(), paths.games.display());
            if !file.file_exists {
                println!("  no games stored yet");
            } else {
                println!("  games: {}", games.len());
                println!("  teams: {}", store::team_names(&games).len());
                if let Some(latest) = store::latest_game(&games) {
                    println!("  latest: {}", latest.bucket_label());
                }
                println!(
                    "  size: {:.2} KB, modified {}",
                    file.size_kb.unwrap_or_default(),
                    file.modified_at.as_deref().unwrap_or("unknown")
                );
            }
            let model = store::file_status(&paths.model);
            if sport == Sport::Nfl {
                println!("  model: {}", if model.file_exists { "trained" } else { "not trained" });
            }
            let injuries = injuries::load(&paths)?;
            match injuries {
                Some(report) => println!("  injuries: {} teams listed", report.len()),
                None => println!("  injuries: no report"),
            }
        }
        Commands::Teams { sport } => {
            let names = store::team_names(&store::read_games(&config.paths(sport).games)?);
            if names.is_empty() {
                return Err(PredictError::NoData(sport.label().to_string()).into());
            }
            for name in names {
                println!("{name}");
            }
        }
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.api.port = port;
            }
            let runtime = tokio::runtime::Runtime::new().context("start tokio runtime")?;
            runtime.block_on(api::serve(config))?;
        }
    }
    Ok(())
}

fn print_extract(summary: &extract::ExtractSummary) {
    println!(
        "{} {}: {} buckets scanned, {} new games, {} stored",
        summary.sport.label(),
        summary.season,
        summary.buckets_scanned,
        summary.new_games,
        summary.total_games
    );
    if !summary.errors.is_empty() {
        println!("{} games skipped:", summary.errors.len());
        for err in &summary.errors {
            println!("  {err}");
        }
    }
}

fn team_or_prompt(value: Option<String>, label: &str) -> Result<String> {
    if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
        return Ok(value.trim().to_string());
    }
    print!("{label}: ");
    io::stdout().flush().context("flush stdout")?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).context("read team name")?;
    let name = line.trim();
    if name.is_empty() {
        bail!("{label} is required");
    }
    Ok(name.to_string())
}

struct PitcherArgs {
    home_name: Option<String>,
    away_name: Option<String>,
    home_id: Option<String>,
    away_id: Option<String>,
}

/// An athlete id beats a sample-table name. Lookup failures are logged and leave the starter out.
fn resolve_pitcher(config: &Config, name: Option<&str>, id: Option<&str>) -> Option<PitcherStats> {
    if let Some(id) = id {
        let fetched = http_client().and_then(|client| pitchers::fetch(client, config.season, id));
        match fetched {
            Ok(Some(stats)) => return Some(stats),
            Ok(None) => warn!(athlete = id, "no pitching stats for athlete"),
            Err(err) => warn!(athlete = id, error = %err, "pitcher lookup failed"),
        }
    }
    let name = name?;
    let stats = pitchers::sample_pitcher(name);
    if stats.is_none() {
        warn!(pitcher = name, "not in the sample pitcher table");
    }
    stats
}

#[allow(clippy::too_many_arguments)]
fn predict(
    config: &Config,
    sport: Sport,
    home: &str,
    away: &str,
    neutral: bool,
    use_ml: bool,
    pitcher_args: &PitcherArgs,
    with_weather: bool,
    json: bool,
) -> Result<()> {
    let paths = config.paths(sport);
    let injuries = injuries::load(&paths)?;
    if injuries.is_none() {
        info!(sport = %sport, "no injury report on disk; injury adjustments skipped");
    }

    if sport == Sport::Mlb {
        let teams = store::load_baseball(&paths.games)?;
        if teams.is_empty() {
            return Err(PredictError::NoData(sport.label().to_string()).into());
        }
        let weather = if with_weather && !neutral {
            Some(weather::summary(http_client()?, home))
        } else {
            None
        };
        let context = GameContext {
            weather,
            home_pitcher: resolve_pitcher(config, pitcher_args.home_name.as_deref(), pitcher_args.home_id.as_deref()),
            away_pitcher: resolve_pitcher(config, pitcher_args.away_name.as_deref(), pitcher_args.away_id.as_deref()),
        };
        let result = baseball_scoring::predict(&teams, home, away, neutral, injuries.as_ref(), &context)?;
        if json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            print!("{}", baseball_scoring::render(&result));
        }
        return Ok(());
    }

    let teams = store::load_football(&paths.games)?;
    if teams.is_empty() {
        return Err(PredictError::NoData(sport.label().to_string()).into());
    }
    let league = League::new(sport, &teams);
    if use_ml {
        if sport != Sport::Nfl {
            bail!("the trained model covers the NFL only");
        }
        let Some(model) = ml::load(&paths.model)? else {
            bail!("no trained model at {}; run `train` first", paths.model.display());
        };
        let result = ml::predict(&league, &model, home, away, neutral, injuries.as_ref())?;
        if json {
            println!("{}", serde_json::to_string_pretty(&result)?);
        } else {
            print!("{}", ml::render(&result));
        }
        return Ok(());
    }

    let result = football_scoring::predict(&league, home, away, neutral, injuries.as_ref())?;
    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", football_scoring::render(&result));
    }
    Ok(())
}
