//! NFL win-probability model: dataset construction, training with hold-out and cross-validated
//! evaluation, isotonic calibration, persistence, and prediction with uncertainty shrinkage.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::aggregate::FootballAverages;
use crate::calibration::{IsotonicCalibrator, evaluate};
use crate::config::ModelConfig;
use crate::error::PredictError;
use crate::features::{FEATURE_COUNT, FEATURE_NAMES, TeamSnapshot, matchup_features, sample_std};
use crate::gbm::{Gbm, GbmParams};
use crate::injuries::{InjuryImpact, InjuryReport, team_impact};
use crate::league::{League, classify_offensive_style};
use crate::model::{FootballGame, Location};
use crate::prediction::{Factor, Method, Prediction, Side, TIE};
use crate::sport::Sport;

pub const MODEL_VERSION: u32 = 1;
const MIN_TRAINING_SAMPLES: usize = 20;
const TOP_IMPORTANCES: usize = 15;
const TOP_EDGES: usize = 8;

/// Scoring spread (points) at which volatility shrinkage is at its maximum.
const VOLATILITY_SCALE: f64 = 14.0;
const MAX_VOLATILITY_SHRINK: f64 = 0.25;
const CLOSE_RECORD_MARGIN: f64 = 0.2;
const CLOSE_RECORD_SHRINK: f64 = 0.05;
const PROBABILITY_FLOOR: f64 = 0.05;
const PROBABILITY_CEILING: f64 = 0.95;

#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<f64>,
    /// `(home, away)` per row.
    pub matchups: Vec<(String, String)>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn subset(&self, idx: &[usize]) -> (Vec<Vec<f64>>, Vec<f64>) {
        (
            idx.iter().map(|&i| self.rows[i].clone()).collect(),
            idx.iter().map(|&i| self.labels[i]).collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureWeight {
    pub feature: String,
    pub importance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub samples: usize,
    pub train_samples: usize,
    pub test_samples: usize,
    pub accuracy: f64,
    pub log_loss: f64,
    pub brier: f64,
    pub calibrated_log_loss: f64,
    pub calibrated_brier: f64,
    pub cv_accuracy_mean: f64,
    pub cv_accuracy_std: f64,
    pub top_features: Vec<FeatureWeight>,
}

/// Everything needed to predict without retraining.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: u32,
    pub generated_at: String,
    pub feature_names: Vec<String>,
    pub params: GbmParams,
    pub model: Gbm,
    pub calibrator: IsotonicCalibrator,
    pub report: TrainingReport,
}

impl ModelArtifact {
    /// Calibrated home-win probability for one feature vector.
    pub fn probability(&self, features: &[f64; FEATURE_COUNT]) -> f64 {
        self.calibrator.apply(self.model.predict_proba(features))
    }

    fn check_features(&self) -> Result<()> {
        if self.feature_names.len() != FEATURE_COUNT
            || self.feature_names.iter().zip(FEATURE_NAMES).any(|(a, b)| a != b)
        {
            bail!("saved model was trained on a different feature set; run `train` again");
        }
        Ok(())
    }
}

/// One sample per unordered team pair: the first regular-season meeting found, seen from the
/// home side. Both teams need `min_games` counted games.
pub fn build_training_set(league: &League, min_games: usize) -> TrainingSet {
    let mut out = TrainingSet::default();
    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
    let eligible = |team: &str| {
        league
            .averages(team)
            .is_some_and(|a| a.games_played >= min_games)
    };

    for team in league.team_names() {
        if !eligible(&team) {
            continue;
        }
        for game in league.games(&team) {
            let key = if team <= game.opponent {
                (team.clone(), game.opponent.clone())
            } else {
                (game.opponent.clone(), team.clone())
            };
            if seen.contains(&key) || !eligible(&game.opponent) {
                continue;
            }
            let (home, away, home_won) = match game.location {
                Location::Home => (team.as_str(), game.opponent.as_str(), game.won()),
                Location::Away => (game.opponent.as_str(), team.as_str(), !game.won()),
            };
            let Some(row) = features_for(league, home, away, None) else {
                continue;
            };
            seen.insert(key);
            out.rows.push(row.to_vec());
            out.labels.push(if home_won { 1.0 } else { 0.0 });
            out.matchups.push((home.to_string(), away.to_string()));
        }
    }
    out
}

fn features_for(
    league: &League,
    home: &str,
    away: &str,
    injuries: Option<(&InjuryImpact, &InjuryImpact)>,
) -> Option<[f64; FEATURE_COUNT]> {
    let home_avg = league.averages(home)?;
    let away_avg = league.averages(away)?;
    let home_games = league.games(home);
    let away_games = league.games(away);
    let (home_injury, away_injury) = match injuries {
        Some((h, a)) => (Some(h), Some(a)),
        None => (None, None),
    };
    Some(matchup_features(
        &TeamSnapshot {
            avg: home_avg,
            games: &home_games,
            injury: home_injury,
        },
        &TeamSnapshot {
            avg: away_avg,
            games: &away_games,
            injury: away_injury,
        },
    ))
}

/// Shuffled index folds; fold `i` takes every `k`-th shuffled index starting at `i`.
fn folds(order: &[usize], k: usize) -> Vec<Vec<usize>> {
    (0..k)
        .map(|f| order.iter().skip(f).step_by(k).copied().collect())
        .collect()
}

fn complement(all: &[usize], fold: &[usize]) -> Vec<usize> {
    let held: BTreeSet<usize> = fold.iter().copied().collect();
    all.iter().copied().filter(|i| !held.contains(i)).collect()
}

pub fn train(league: &League, config: &ModelConfig) -> Result<ModelArtifact> {
    if league.sport != Sport::Nfl {
        return Err(PredictError::InvalidRequest(format!(
            "the ML model is only available for {}",
            Sport::Nfl.label()
        ))
        .into());
    }
    let data = build_training_set(league, config.min_games);
    if data.len() < MIN_TRAINING_SAMPLES {
        warn!(
            samples = data.len(),
            needed = MIN_TRAINING_SAMPLES,
            "not enough matchups to train"
        );
        return Err(PredictError::NoData(format!("{} training", Sport::Nfl.label())).into());
    }
    info!(samples = data.len(), features = FEATURE_COUNT, "training set built");

    let params = &config.gbm;
    let k = config.cv_folds.max(2);
    let mut order: Vec<usize> = (0..data.len()).collect();
    order.shuffle(&mut StdRng::seed_from_u64(params.seed));

    let test_len = ((data.len() as f64 * config.test_fraction).round() as usize).clamp(1, data.len() - 1);
    let (test_idx, train_idx) = order.split_at(test_len);
    let (train_rows, train_labels) = data.subset(train_idx);
    let (test_rows, test_labels) = data.subset(test_idx);

    let model = Gbm::fit(&train_rows, &train_labels, params).context("fitting classifier")?;
    let raw = evaluate(&model.predict_many(&test_rows), &test_labels);

    // Cross-validated accuracy over the whole set.
    let cv: Vec<f64> = folds(&order, k)
        .par_iter()
        .map(|fold| -> Result<f64> {
            let (rows, labels) = data.subset(&complement(&order, fold));
            let (held_rows, held_labels) = data.subset(fold);
            let m = Gbm::fit(&rows, &labels, params)?;
            Ok(evaluate(&m.predict_many(&held_rows), &held_labels).accuracy)
        })
        .collect::<Result<_>>()
        .context("cross-validation")?;
    let cv_mean = cv.iter().sum::<f64>() / cv.len() as f64;
    let cv_std = (cv.iter().map(|a| (a - cv_mean).powi(2)).sum::<f64>() / cv.len() as f64).sqrt();

    // Out-of-fold scores on the training split feed the calibrator.
    let train_positions: Vec<usize> = (0..train_idx.len()).collect();
    let oof: Vec<Vec<(usize, f64)>> = folds(&train_positions, k)
        .par_iter()
        .map(|fold| -> Result<Vec<(usize, f64)>> {
            let fit_on = complement(&train_positions, fold);
            let rows: Vec<Vec<f64>> = fit_on.iter().map(|&i| train_rows[i].clone()).collect();
            let labels: Vec<f64> = fit_on.iter().map(|&i| train_labels[i]).collect();
            let m = Gbm::fit(&rows, &labels, params)?;
            Ok(fold
                .iter()
                .map(|&i| (i, m.predict_proba(&train_rows[i])))
                .collect())
        })
        .collect::<Result<_>>()
        .context("out-of-fold calibration")?;
    let mut oof_scores = vec![0.5; train_idx.len()];
    for (i, p) in oof.into_iter().flatten() {
        oof_scores[i] = p;
    }
    let calibrator = IsotonicCalibrator::fit(&oof_scores, &train_labels);

    let calibrated: Vec<f64> = model
        .predict_many(&test_rows)
        .into_iter()
        .map(|p| calibrator.apply(p))
        .collect();
    let cal = evaluate(&calibrated, &test_labels);

    let mut top_features: Vec<FeatureWeight> = FEATURE_NAMES
        .iter()
        .zip(model.feature_importance())
        .map(|(name, importance)| FeatureWeight {
            feature: name.to_string(),
            importance: *importance,
        })
        .collect();
    top_features.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    top_features.truncate(TOP_IMPORTANCES);

    let report = TrainingReport {
        samples: data.len(),
        train_samples: train_idx.len(),
        test_samples: test_idx.len(),
        accuracy: raw.accuracy,
        log_loss: raw.log_loss,
        brier: raw.brier,
        calibrated_log_loss: cal.log_loss,
        calibrated_brier: cal.brier,
        cv_accuracy_mean: cv_mean,
        cv_accuracy_std: cv_std,
        top_features,
    };
    info!(
        accuracy = report.accuracy,
        log_loss = report.log_loss,
        calibrated_log_loss = report.calibrated_log_loss,
        cv_accuracy = report.cv_accuracy_mean,
        "model trained"
    );

    Ok(ModelArtifact {
        version: MODEL_VERSION,
        generated_at: chrono::Utc::now().to_rfc3339(),
        feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        params: params.clone(),
        model,
        calibrator,
        report,
    })
}

pub fn render_report(report: &TrainingReport) -> String {
    let rule = "=".repeat(100);
    let mut out = String::new();
    let _ = writeln!(out, "{rule}\nMODEL PERFORMANCE\n{rule}");
    let _ = writeln!(out, "Training set: {} games", report.train_samples);
    let _ = writeln!(out, "Test set: {} games", report.test_samples);
    let _ = writeln!(out, "Accuracy: {:.1}%", report.accuracy * 100.0);
    let _ = writeln!(out, "Log Loss: {:.3} (lower is better)", report.log_loss);
    let _ = writeln!(out, "Brier Score: {:.3} (lower is better, perfect = 0.0)", report.brier);
    let _ = writeln!(
        out,
        "Cross-Validation Accuracy: {:.1}% (+/- {:.1}%)",
        report.cv_accuracy_mean * 100.0,
        report.cv_accuracy_std * 200.0
    );
    let _ = writeln!(out, "\nTop {} Most Important Features:", report.top_features.len());
    for f in &report.top_features {
        let _ = writeln!(out, "  {:40} {:.4}", f.feature, f.importance);
    }
    let _ = writeln!(out, "\nAfter Calibration:");
    let _ = writeln!(
        out,
        "  Log Loss: {:.3} (improved: {:+.3})",
        report.calibrated_log_loss,
        report.log_loss - report.calibrated_log_loss
    );
    let _ = writeln!(
        out,
        "  Brier Score: {:.3} (improved: {:+.3})",
        report.calibrated_brier,
        report.brier - report.calibrated_brier
    );
    out
}

pub fn save(path: &Path, artifact: &ModelArtifact) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let json = serde_json::to_string(artifact).context("serialize model")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}

/// `None` when no model has been trained yet.
pub fn load(path: &Path) -> Result<Option<ModelArtifact>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let artifact: ModelArtifact =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    artifact.check_features()?;
    Ok(Some(artifact))
}

/// A feature that favours one side, as shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    pub feature: String,
    pub label: String,
    pub magnitude: f64,
    pub favors: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MlPrediction {
    #[serde(flatten)]
    pub prediction: Prediction,
    pub away_win_probability: f64,
    pub raw_probability: f64,
    pub calibrated_probability: f64,
    pub shrinkage: f64,
    pub top_edges: Vec<Edge>,
    pub features: BTreeMap<String, f64>,
    pub home_stats: FootballAverages,
    pub away_stats: FootballAverages,
}

/// How far to pull a probability toward 0.5: scoring volatility over the last five games of
/// both teams, plus a little more when the records are close.
pub fn shrinkage(home_games: &[&FootballGame], away_games: &[&FootballGame], win_rate_diff: f64) -> f64 {
    let spread = |games: &[&FootballGame]| {
        let recent: Vec<f64> = games[games.len().saturating_sub(5)..]
            .iter()
            .map(|g| g.score_for as f64)
            .collect();
        sample_std(&recent)
    };
    let volatility = (spread(home_games) + spread(away_games)) / 2.0;
    let mut shrink = (volatility / VOLATILITY_SCALE).clamp(0.0, 1.0) * MAX_VOLATILITY_SHRINK;
    if win_rate_diff.abs() < CLOSE_RECORD_MARGIN {
        shrink += CLOSE_RECORD_SHRINK;
    }
    shrink
}

pub fn shrink_probability(p: f64, shrink: f64) -> f64 {
    (0.5 + (p - 0.5) * (1.0 - shrink)).clamp(PROBABILITY_FLOOR, PROBABILITY_CEILING)
}

/// Matchup edges ranked by magnitude. Per-team features credit their team when positive;
/// differences credit home when positive and away otherwise.
pub fn top_edges(values: &[f64; FEATURE_COUNT], home: &str, away: &str) -> Vec<Edge> {
    let mut edges: Vec<(&str, f64, &str)> = Vec::new();
    for (name, v) in FEATURE_NAMES.into_iter().zip(values) {
        let v = *v;
        if !(name.contains("vs") || name.contains("diff")) {
            continue;
        }
        if name.starts_with("home_") && v > 0.0 {
            edges.push((name, v, home));
        } else if name.starts_with("away_") && v > 0.0 {
            edges.push((name, v, away));
        } else if name.contains("diff") {
            if v > 0.0 {
                edges.push((name, v, home));
            } else {
                edges.push((name, v.abs(), away));
            }
        }
    }
    edges.sort_by(|a, b| b.1.abs().total_cmp(&a.1.abs()));
    edges
        .into_iter()
        .take(TOP_EDGES)
        .map(|(name, magnitude, favors)| Edge {
            feature: name.to_string(),
            label: name.replace('_', " ").replace("home", home).replace("away", away),
            magnitude,
            favors: favors.to_string(),
        })
        .collect()
}

pub fn predict(
    league: &League,
    artifact: &ModelArtifact,
    home: &str,
    away: &str,
    neutral_site: bool,
    injuries: Option<&InjuryReport>,
) -> Result<MlPrediction> {
    let missing: Vec<String> = [home, away]
        .into_iter()
        .filter(|t| !league.contains(t))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(PredictError::UnknownTeam(missing).into());
    }
    let (Some(home_avg), Some(away_avg)) = (league.averages(home), league.averages(away)) else {
        return Err(PredictError::InvalidRequest(format!("no season data for {away} at {home}")).into());
    };
    artifact.check_features()?;

    let impacts = injuries.map(|report| {
        (
            team_impact(league.sport, report, home),
            team_impact(league.sport, report, away),
        )
    });
    let values = features_for(
        league,
        home,
        away,
        impacts.as_ref().map(|(h, a)| (h, a)),
    )
    .ok_or_else(|| PredictError::InvalidRequest(format!("no season data for {away} at {home}")))?;

    let raw = artifact.model.predict_proba(&values);
    let calibrated = artifact.calibrator.apply(raw);
    let shrink = shrinkage(
        &league.games(home),
        &league.games(away),
        home_avg.win_rate - away_avg.win_rate,
    );
    let p_home = shrink_probability(calibrated, shrink);
    let edges = top_edges(&values, home, away);

    let winner = if p_home > 0.5 {
        home.to_string()
    } else if p_home < 0.5 {
        away.to_string()
    } else {
        TIE.to_string()
    };
    let factors = edges
        .iter()
        .map(|e| Factor {
            side: if e.favors == home { Side::Home } else { Side::Away },
            points: e.magnitude,
            reason: e.label.clone(),
        })
        .collect();

    let prediction = Prediction {
        sport: league.sport,
        method: Method::Ml,
        home_team: home.to_string(),
        away_team: away.to_string(),
        neutral_site,
        home_points: p_home * 100.0,
        away_points: (1.0 - p_home) * 100.0,
        winner,
        confidence: p_home.max(1.0 - p_home) * 100.0,
        home_win_probability: Some(p_home),
        factors,
    };
    if neutral_site {
        warn!(home, away, "the classifier has no neutral-site feature; home context still applies");
    }

    Ok(MlPrediction {
        prediction,
        away_win_probability: 1.0 - p_home,
        raw_probability: raw,
        calibrated_probability: calibrated,
        shrinkage: shrink,
        top_edges: edges,
        features: FEATURE_NAMES
            .iter()
            .zip(values)
            .map(|(n, v)| (n.to_string(), v))
            .collect(),
        home_stats: home_avg.clone(),
        away_stats: away_avg.clone(),
    })
}

fn strength(p: f64) -> &'static str {
    if p > 0.70 {
        "STRONG favorite"
    } else if p > 0.60 {
        "Moderate favorite"
    } else {
        "Slight favorite"
    }
}

pub fn render(result: &MlPrediction) -> String {
    let p = &result.prediction;
    let rule = "=".repeat(100);
    let mut out = String::new();
    let _ = writeln!(out, "{rule}\nMACHINE LEARNING PREDICTION: {} vs {}\n{rule}", p.home_team, p.away_team);
    for (name, role, avg) in [
        (&p.home_team, "Home", &result.home_stats),
        (&p.away_team, "Away", &result.away_stats),
    ] {
        let _ = writeln!(
            out,
            "\n{name} ({role}):\n  Record: {}-{} ({:.1}%)",
            avg.wins,
            avg.games_played - avg.wins,
            avg.win_rate * 100.0
        );
        let _ = writeln!(
            out,
            "  Offensive Style: {}",
            classify_offensive_style(avg).label().replace('_', " ").to_uppercase()
        );
        let _ = writeln!(
            out,
            "  Points: {:.1}/game (allowed: {:.1})",
            avg.offense.points_scored, avg.defense.points_allowed
        );
        let _ = writeln!(
            out,
            "  Recent Form: {}-{} last {}",
            avg.recent_form.wins,
            avg.recent_form.games - avg.recent_form.wins,
            avg.recent_form.games
        );
    }
    let _ = writeln!(out, "\n{rule}\nKey Matchup Advantages:\n{rule}");
    for e in &result.top_edges {
        let _ = writeln!(out, "  {}: {:+.3} (favors {})", e.label, e.magnitude, e.favors);
    }
    let home_p = p.home_win_probability.unwrap_or(0.5);
    let _ = writeln!(out, "\n{rule}\nFINAL PREDICTION\n{rule}");
    let _ = writeln!(out, "{} Win Probability: {:.1}%", p.home_team, home_p * 100.0);
    let _ = writeln!(out, "{} Win Probability: {:.1}%", p.away_team, result.away_win_probability * 100.0);
    if p.is_tie() {
        let _ = writeln!(out, "PREDICTION: Too close to call");
    } else {
        let _ = writeln!(out, "PREDICTION: {} wins", p.winner);
        let _ = writeln!(out, "Confidence: {:.1}%", p.confidence);
        let _ = writeln!(out, "Strength: {}", strength(p.confidence / 100.0));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FootballBox, FootballSides, FootballTeams, GameRecord, GameResult, SeasonPhase};

    fn game(opp: &str, loc: Location, pf: u32, pa: u32, ypp: f64) -> FootballGame {
        GameRecord {
            opponent: opp.to_string(),
            location: loc,
            result: if pf > pa { GameResult::Win } else { GameResult::Loss },
            score_for: pf,
            score_against: pa,
            phase: SeasonPhase::Regular,
            week: None,
            stats: FootballSides {
                off: FootballBox {
                    yards_per_play: ypp,
                    total_yards: ypp * 62.0,
                    ..FootballBox::default()
                },
                ..FootballSides::default()
            },
        }
    }

    /// Round robin where the team listed first always wins at home.
    fn league_data() -> FootballTeams {
        let names = ["A", "B", "C", "D"];
        let mut teams = FootballTeams::new();
        for (i, home) in names.iter().enumerate() {
            for away in &names[i + 1..] {
                teams
                    .entry(home.to_string())
                    .or_default()
                    .push(game(away, Location::Home, 24, 10, 6.0));
                teams
                    .entry(away.to_string())
                    .or_default()
                    .push(game(home, Location::Away, 10, 24, 4.5));
            }
        }
        teams
    }

    #[test]
    fn one_sample_per_pair() {
        let teams = league_data();
        let league = League::new(Sport::Nfl, &teams);
        let set = build_training_set(&league, 3);
        assert_eq!(set.len(), 6);
        assert!(set.labels.iter().all(|y| *y == 1.0));
        let pairs: BTreeSet<(String, String)> = set.matchups.iter().cloned().collect();
        assert_eq!(pairs.len(), 6);
        assert!(build_training_set(&league, 4).is_empty());
    }

    #[test]
    fn shrinkage_pulls_toward_even() {
        assert_eq!(shrink_probability(0.9, 0.0), 0.9);
        assert!((shrink_probability(0.9, 0.5) - 0.7).abs() < 1e-12);
        assert_eq!(shrink_probability(0.99, 0.0), 0.95);
        assert_eq!(shrink_probability(0.01, 0.0), 0.05);
        assert_eq!(shrink_probability(0.5, 0.3), 0.5);
    }

    #[test]
    fn steady_scorers_with_different_records_are_not_shrunk() {
        let g = game("X", Location::Home, 20, 10, 5.0);
        let games = vec![&g; 5];
        assert_eq!(shrinkage(&games, &games, 0.5), 0.0);
        assert_eq!(shrinkage(&games, &games, 0.1), CLOSE_RECORD_SHRINK);
    }

    #[test]
    fn edges_credit_the_right_side() {
        let mut values = [0.0; FEATURE_COUNT];
        values[crate::features::feature_index("win_rate_diff").unwrap()] = -0.4;
        values[crate::features::feature_index("home_rush_vs_away_rush_d").unwrap()] = 1.3;
        values[crate::features::feature_index("away_pass_vs_home_pass_d").unwrap()] = 0.9;
        let edges = top_edges(&values, "Bears", "Lions");
        assert_eq!(edges.len(), TOP_EDGES);
        assert_eq!(edges[0].feature, "home_rush_vs_away_rush_d");
        assert_eq!(edges[0].favors, "Bears");
        assert_eq!(edges[0].label, "Bears rush vs Lions rush d");
        assert_eq!(edges[1].favors, "Lions");
        assert_eq!(edges[2].feature, "win_rate_diff");
        assert_eq!(edges[2].favors, "Lions");
        assert_eq!(edges[2].magnitude, 0.4);
    }

    #[test]
    fn model_round_trips_through_disk() {
        let teams = league_data();
        let league = League::new(Sport::Nfl, &teams);
        let set = build_training_set(&league, 3);
        let params = GbmParams {
            n_trees: 5,
            ..GbmParams::default()
        };
        let model = Gbm::fit(&set.rows, &set.labels, &params).unwrap();
        let artifact = ModelArtifact {
            version: MODEL_VERSION,
            generated_at: "now".to_string(),
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            params,
            model,
            calibrator: IsotonicCalibrator::identity(),
            report: TrainingReport {
                samples: set.len(),
                train_samples: set.len(),
                test_samples: 0,
                accuracy: 1.0,
                log_loss: 0.0,
                brier: 0.0,
                calibrated_log_loss: 0.0,
                calibrated_brier: 0.0,
                cv_accuracy_mean: 1.0,
                cv_accuracy_std: 0.0,
                top_features: Vec::new(),
            },
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nfl_model.json");
        save(&path, &artifact).unwrap();
        let loaded = load(&path).unwrap().unwrap();
        assert_eq!(loaded.model.trees().len(), artifact.model.trees().len());
        let row = &set.rows[0];
        assert!((loaded.model.predict_proba(row) - artifact.model.predict_proba(row)).abs() < 1e-9);

        let result = predict(&league, &loaded, "A", "D", false, None).unwrap();
        let p = result.prediction.home_win_probability.unwrap();
        assert!((0.05..=0.95).contains(&p));
        assert_eq!(result.prediction.method, Method::Ml);
        assert_eq!(result.features.len(), FEATURE_COUNT);
        assert!(load(&dir.path().join("missing.json")).unwrap().is_none());
    }

    #[test]
    fn too_little_data_is_refused() {
        let teams = league_data();
        let league = League::new(Sport::Nfl, &teams);
        let err = train(&league, &ModelConfig::default()).unwrap_err();
        assert!(matches!(err.downcast_ref::<PredictError>(), Some(PredictError::NoData(_))));
    }
}
