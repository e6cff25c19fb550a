use std::path::PathBuf;

use anyhow::{Context, Result};

use sports_predictor::baseball_scoring::{self, GameContext};
use sports_predictor::calibration;
use sports_predictor::config::Config;
use sports_predictor::football_scoring;
use sports_predictor::league::League;
use sports_predictor::model::{SeasonPhase, StoredGame};
use sports_predictor::prediction::Prediction;
use sports_predictor::sport::Sport;
use sports_predictor::store;

const DEFAULT_MIN_PRIOR_GAMES: usize = 3;
const CALIBRATION_BINS: usize = 10;

/// Replays stored regular-season games in order. Every game is predicted from the games of
/// earlier weeks (or dates) only, then scored against the real result.
fn main() -> Result<()> {
    let sport: Sport = arg_value("--sport")
        .map(|s| s.parse())
        .transpose()?
        .unwrap_or(Sport::Nfl);
    let min_prior = arg_value("--min-games")
        .map(|s| s.parse::<usize>())
        .transpose()
        .context("--min-games must be a number")?
        .unwrap_or(DEFAULT_MIN_PRIOR_GAMES);
    let mut config = Config::load(None)?;
    if let Some(dir) = arg_value("--data-dir") {
        config.data_dir = PathBuf::from(dir);
    }

    let paths = config.paths(sport);
    let mut games = store::read_games(&paths.games)?;
    games.sort_by_key(StoredGame::bucket_key);

    let mut probs = Vec::new();
    let mut outcomes = Vec::new();
    let mut skipped = 0usize;
    let mut start = 0usize;
    while start < games.len() {
        let key = games[start].bucket_key();
        let end = start + games[start..].iter().take_while(|g| g.bucket_key() == key).count();
        let (prior, bucket) = (&games[..start], &games[start..end]);
        start = end;
        if bucket[0].phase != SeasonPhase::Regular {
            continue;
        }

        let predictions = predict_bucket(sport, prior, bucket, min_prior)?;
        for (game, prediction) in bucket.iter().zip(predictions) {
            if game.is_tie() {
                continue;
            }
            let Some(prediction) = prediction else {
                skipped += 1;
                continue;
            };
            probs.push(implied_home_probability(&prediction));
            outcomes.push(if game.home.score > game.away.score { 1.0 } else { 0.0 });
        }
    }

    let metrics = calibration::evaluate(&probs, &outcomes);
    let home_rate = if outcomes.is_empty() {
        0.0
    } else {
        outcomes.iter().sum::<f64>() / outcomes.len() as f64
    };
    let baseline = calibration::evaluate(&vec![home_rate; outcomes.len()], &outcomes);

    println!("{} walk-forward heuristic backtest", sport.label());
    println!("Data: {}", paths.games.display());
    println!("Samples: {} (skipped {skipped} with fewer than {min_prior} prior games)", metrics.samples);
    println!();
    print_metrics("Heuristic scorer", metrics);
    print_metrics("Home-rate baseline", baseline);
    println!();
    println!("Calibration bins (home win):");
    for bin in calibration::calibration_bins(&probs, &outcomes, CALIBRATION_BINS) {
        if bin.count == 0 {
            continue;
        }
        println!(
            "  [{:.1}, {:.1})  n={:>4}  predicted={:.3}  actual={:.3}",
            bin.bucket_start, bin.bucket_end, bin.count, bin.avg_pred, bin.actual_rate
        );
    }
    Ok(())
}

/// `None` for games where either side has too little history.
fn predict_bucket(
    sport: Sport,
    prior: &[StoredGame],
    bucket: &[StoredGame],
    min_prior: usize,
) -> Result<Vec<Option<Prediction>>> {
    if sport == Sport::Mlb {
        let teams = store::baseball_teams(prior)?;
        let context = GameContext::default();
        return Ok(bucket
            .iter()
            .map(|g| {
                let enough = [&g.home.name, &g.away.name]
                    .iter()
                    .all(|t| teams.get(*t).is_some_and(|games| games.len() >= min_prior));
                if !enough {
                    return None;
                }
                baseball_scoring::predict(&teams, &g.home.name, &g.away.name, g.neutral_site, None, &context)
                    .ok()
                    .map(|r| r.prediction)
            })
            .collect());
    }

    let teams = store::football_teams(prior)?;
    let league = League::new(sport, &teams);
    Ok(bucket
        .iter()
        .map(|g| {
            let enough = [&g.home.name, &g.away.name]
                .iter()
                .all(|t| league.games(t).len() >= min_prior);
            if !enough {
                return None;
            }
            football_scoring::predict(&league, &g.home.name, &g.away.name, g.neutral_site, None)
                .ok()
                .map(|r| r.prediction)
        })
        .collect())
}

/// Confidence read as distance from a coin flip: 0% is 0.5, 100% is certainty.
fn implied_home_probability(p: &Prediction) -> f64 {
    if let Some(prob) = p.home_win_probability {
        return prob;
    }
    let edge = p.confidence / 200.0;
    if p.is_tie() {
        0.5
    } else if p.home_favored() {
        0.5 + edge
    } else {
        0.5 - edge
    }
}

fn arg_value(name: &str) -> Option<String> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    let prefix = format!("{name}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            return Some(value.trim().to_string());
        }
        if arg == name {
            return args.get(idx + 1).cloned();
        }
    }
    None
}

fn print_metrics(label: &str, metrics: calibration::Metrics) {
    println!("{label}:");
    println!(
        "  samples={} brier={:.4} log_loss={:.4} accuracy={:.3}",
        metrics.samples, metrics.brier, metrics.log_loss, metrics.accuracy
    );
}
