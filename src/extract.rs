use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::espn::{Bucket, GameSource, parse_scoreboard, parse_summary};
use crate::model::{SeasonPhase, StoredGame};
use crate::sport::Sport;
use crate::store;

const NFL_PRESEASON_WEEKS: u32 = 3;
const NFL_REGULAR_WEEKS: u32 = 18;
const CFB_REGULAR_WEEKS: u32 = 15;
const MLB_OPENING: (u32, u32) = (3, 20);
const MLB_CLOSING: (u32, u32) = (10, 1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractMode {
    Full,
    Update,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractSummary {
    pub sport: Sport,
    pub mode: ExtractMode,
    pub season: i32,
    pub buckets_scanned: usize,
    pub new_games: usize,
    pub total_games: usize,
    pub errors: Vec<String>,
}

/// Every bucket of a season in chronological order. Baseball dates after `today` are skipped.
pub fn season_buckets(sport: Sport, season: i32, today: NaiveDate) -> Vec<Bucket> {
    match sport {
        Sport::Nfl => (1..=NFL_PRESEASON_WEEKS)
            .map(|w| Bucket::week(SeasonPhase::Preseason, w))
            .chain((1..=NFL_REGULAR_WEEKS).map(|w| Bucket::week(SeasonPhase::Regular, w)))
            .collect(),
        Sport::Cfb => (0..=CFB_REGULAR_WEEKS)
            .map(|w| Bucket::week(SeasonPhase::Regular, w))
            .chain(std::iter::once(Bucket::week(SeasonPhase::Postseason, 1)))
            .collect(),
        Sport::Mlb => {
            let (Some(start), Some(end)) = (
                NaiveDate::from_ymd_opt(season, MLB_OPENING.0, MLB_OPENING.1),
                NaiveDate::from_ymd_opt(season, MLB_CLOSING.0, MLB_CLOSING.1),
            ) else {
                return Vec::new();
            };
            start
                .iter_days()
                .take_while(|d| *d <= end && *d <= today)
                .map(Bucket::day)
                .collect()
        }
    }
}

/// Scrape every bucket and rewrite the sport's game file.
pub fn run_full(source: &impl GameSource, config: &Config, sport: Sport) -> Result<ExtractSummary> {
    let paths = config.paths(sport);
    let buckets = season_buckets(sport, config.season, today());
    info!(sport = %sport, season = config.season, buckets = buckets.len(), "full extraction");

    let mut errors = Vec::new();
    let games = scrape_buckets(source, config, sport, &buckets, &mut errors);
    store::write_games(&paths.games, &games)?;

    Ok(ExtractSummary {
        sport,
        mode: ExtractMode::Full,
        season: config.season,
        buckets_scanned: buckets.len(),
        new_games: games.len(),
        total_games: games.len(),
        errors,
    })
}

/// Re-scrape from the last stored bucket onward and merge by event id: a fresh copy replaces the
/// stored game, unseen events are appended, and stored games that could not be re-fetched stay.
/// Falls back to a full run when there is nothing stored yet.
pub fn run_update(
    source: &impl GameSource,
    config: &Config,
    sport: Sport,
) -> Result<ExtractSummary> {
    let paths = config.paths(sport);
    let mut games = store::read_games(&paths.games)?;
    let buckets = season_buckets(sport, config.season, today());

    let Some(start) = store::latest_game(&games).and_then(|g| bucket_index(&buckets, g)) else {
        info!(sport = %sport, "no stored games to resume from; running full extraction");
        return run_full(source, config, sport);
    };
    info!(sport = %sport, resume_from = %buckets[start].label(), "update extraction");

    let mut errors = Vec::new();
    let fresh = scrape_buckets(source, config, sport, &buckets[start..], &mut errors);
    let new_games = merge_games(&mut games, fresh);
    store::write_games(&paths.games, &games)?;
    if !errors.is_empty() {
        warn!(sport = %sport, failures = errors.len(), "update incomplete; stored copies kept");
    }

    Ok(ExtractSummary {
        sport,
        mode: ExtractMode::Update,
        season: config.season,
        buckets_scanned: buckets.len() - start,
        new_games,
        total_games: games.len(),
        errors,
    })
}

/// Replace stored games in place by event id and append the rest. Returns how many were new.
fn merge_games(stored: &mut Vec<StoredGame>, fresh: Vec<StoredGame>) -> usize {
    let index: HashMap<String, usize> = stored
        .iter()
        .enumerate()
        .map(|(i, g)| (g.event_id.clone(), i))
        .collect();
    let mut added = 0;
    for game in fresh {
        match index.get(&game.event_id) {
            Some(&i) => stored[i] = game,
            None => {
                stored.push(game);
                added += 1;
            }
        }
    }
    added
}

fn scrape_buckets(
    source: &impl GameSource,
    config: &Config,
    sport: Sport,
    buckets: &[Bucket],
    errors: &mut Vec<String>,
) -> Vec<StoredGame> {
    let mut games = Vec::new();
    for (i, bucket) in buckets.iter().enumerate() {
        if i > 0 {
            pause(config.bucket_delay());
        }
        let label = bucket.label();
        let scoreboard = match source.scoreboard(sport, config.season, bucket) {
            Ok(v) => v,
            Err(err) => {
                warn!(bucket = %label, error = %err, "scoreboard fetch failed");
                errors.push(format!("{label}: {err:#}"));
                continue;
            }
        };

        let finished: Vec<_> = parse_scoreboard(&scoreboard)
            .into_iter()
            .filter(|g| g.completed)
            .collect();
        if finished.is_empty() {
            debug!(bucket = %label, "no completed games");
            continue;
        }
        info!(bucket = %label, games = finished.len(), "scraping bucket");

        for (j, scheduled) in finished.iter().enumerate() {
            if j > 0 {
                pause(config.game_delay());
            }
            let parsed = source
                .summary(sport, &scheduled.event_id)
                .and_then(|v| parse_summary(sport, bucket, scheduled.phase, &scheduled.event_id, &v));
            match parsed {
                Ok(game) => {
                    debug!(
                        away = %game.away.name,
                        home = %game.home.name,
                        score = %format!("{}-{}", game.away.score, game.home.score),
                        "game stored"
                    );
                    games.push(game);
                }
                Err(err) => {
                    warn!(event = %scheduled.event_id, error = %err, "skipping game");
                    errors.push(format!("{label} event {}: {err:#}", scheduled.event_id));
                }
            }
        }
    }
    games
}

/// Which bucket a stored game came from: week buckets by (phase, week), date buckets by date.
fn bucket_index(buckets: &[Bucket], game: &StoredGame) -> Option<usize> {
    buckets.iter().position(|b| match (b.week, b.date_string()) {
        (Some(week), _) => game.phase == b.phase && game.week == Some(week),
        (None, Some(date)) => game.date.as_deref() == Some(date.as_str()),
        (None, None) => false,
    })
}

fn pause(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// The NFL postseason runs on scoreboard weeks 1–4 of season type 3; callers number it 19–22.
pub fn nfl_week_bucket(week: u32, phase: SeasonPhase) -> Bucket {
    if week > NFL_REGULAR_WEEKS {
        return Bucket::week(SeasonPhase::Postseason, week - NFL_REGULAR_WEEKS);
    }
    Bucket::week(phase, week)
}
