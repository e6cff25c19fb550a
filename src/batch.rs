//! Weekly batch predictions: fetch a football week's schedule, predict every game, and write the
//! results as a text report and a workbook.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::PredictError;
use crate::espn::{Bucket, GameSource, ScheduledGame, parse_scoreboard};
use crate::extract::nfl_week_bucket;
use crate::football_scoring;
use crate::injuries::{self, InjuryReport};
use crate::league::League;
use crate::ml::{self, ModelArtifact};
use crate::model::SeasonPhase;
use crate::prediction::{Method, Prediction};
use crate::sport::Sport;
use crate::store;

const NFL_LAST_WEEK: u32 = 22;
const NFL_POSTSEASON_FIRST_WEEK: u32 = 19;
const CFB_LAST_WEEK: u32 = 16;

#[derive(Debug, Clone)]
pub struct BatchRequest {
    pub sport: Sport,
    pub week: u32,
    pub phase: SeasonPhase,
    pub use_ml: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchPrediction {
    pub home_team: String,
    pub away_team: String,
    pub home_points: f64,
    pub away_points: f64,
    pub winner: String,
    pub confidence: f64,
    pub is_neutral: bool,
    pub method: Method,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_win_probability: Option<f64>,
    pub status: &'static str,
}

impl From<Prediction> for BatchPrediction {
    fn from(p: Prediction) -> Self {
        Self {
            home_team: p.home_team,
            away_team: p.away_team,
            home_points: p.home_points,
            away_points: p.away_points,
            winner: p.winner,
            confidence: p.confidence,
            is_neutral: p.neutral_site,
            method: p.method,
            home_win_probability: p.home_win_probability,
            status: "predicted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedGame {
    pub home_team: String,
    pub away_team: String,
    pub is_neutral: bool,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub sport: Sport,
    pub week: u32,
    pub season_type: String,
    pub total_games: usize,
    pub predicted_games: usize,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workbook_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub predictions: Vec<BatchPrediction>,
    pub failed_games: Vec<FailedGame>,
    pub summary: BatchSummary,
}

pub fn parse_season_type(raw: &str) -> Result<SeasonPhase, PredictError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "regular" => Ok(SeasonPhase::Regular),
        "preseason" => Ok(SeasonPhase::Preseason),
        "postseason" | "playoffs" => Ok(SeasonPhase::Postseason),
        other => Err(PredictError::InvalidRequest(format!(
            "unknown season type `{other}` (expected preseason, regular or postseason)"
        ))),
    }
}

/// Validates the week and maps it onto a scoreboard bucket. NFL weeks 19–22 are always postseason.
pub fn week_bucket(request: &BatchRequest) -> Result<Bucket, PredictError> {
    match request.sport {
        Sport::Nfl if (1..=NFL_LAST_WEEK).contains(&request.week) => {
            Ok(nfl_week_bucket(request.week, request.phase))
        }
        Sport::Cfb if request.week <= CFB_LAST_WEEK => Ok(Bucket::week(request.phase, request.week)),
        Sport::Mlb => Err(PredictError::InvalidRequest(
            "batch predictions cover football weeks; predict baseball games one at a time".to_string(),
        )),
        sport => Err(PredictError::InvalidRequest(format!(
            "week {} is out of range for {}",
            request.week,
            sport.label()
        ))),
    }
}

fn effective_season_type(request: &BatchRequest) -> &'static str {
    let phase = if request.sport == Sport::Nfl && request.week >= NFL_POSTSEASON_FIRST_WEEK {
        SeasonPhase::Postseason
    } else {
        request.phase
    };
    match phase {
        SeasonPhase::Preseason => "preseason",
        SeasonPhase::Regular => "regular",
        SeasonPhase::Postseason => "postseason",
    }
}

/// Fetch the schedule, predict, and write both output files.
pub fn run(source: &impl GameSource, config: &Config, request: &BatchRequest) -> Result<BatchResult> {
    let bucket = week_bucket(request)?;
    let paths = config.paths(request.sport);

    let teams = store::load_football(&paths.games)?;
    if teams.is_empty() {
        return Err(PredictError::NoData(request.sport.label().to_string()).into());
    }
    let league = League::new(request.sport, &teams);
    let injuries = injuries::load(&paths)?;
    let model = if request.use_ml && request.sport == Sport::Nfl {
        let model = ml::load(&paths.model)?;
        if model.is_none() {
            warn!(path = %paths.model.display(), "no trained model; using heuristic predictions");
        }
        model
    } else {
        None
    };

    let scoreboard = source
        .scoreboard(request.sport, config.season, &bucket)
        .with_context(|| format!("fetch {} schedule for {}", request.sport, bucket.label()))?;
    let games = parse_scoreboard(&scoreboard);
    info!(sport = %request.sport, week = request.week, games = games.len(), "schedule fetched");

    let (predictions, failed_games) = predict_games(&league, &games, injuries.as_ref(), model.as_ref());

    let mut result = BatchResult {
        summary: BatchSummary {
            sport: request.sport,
            week: request.week,
            season_type: effective_season_type(request).to_string(),
            total_games: games.len(),
            predicted_games: predictions.len(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            report_file: None,
            workbook_file: None,
        },
        predictions,
        failed_games,
    };
    if games.is_empty() {
        warn!(sport = %request.sport, week = request.week, "no games scheduled");
        return Ok(result);
    }

    let txt = paths.predictions_txt(request.week);
    let xlsx = paths.predictions_xlsx(request.week);
    write_report(&txt, &result)?;
    write_workbook(&xlsx, &result)?;
    result.summary.report_file = Some(txt);
    result.summary.workbook_file = Some(xlsx);
    info!(
        predicted = result.summary.predicted_games,
        failed = result.failed_games.len(),
        "batch complete"
    );
    Ok(result)
}

/// Predicts each scheduled game; a game that cannot be predicted is recorded with its reason.
pub fn predict_games(
    league: &League,
    games: &[ScheduledGame],
    injuries: Option<&InjuryReport>,
    model: Option<&ModelArtifact>,
) -> (Vec<BatchPrediction>, Vec<FailedGame>) {
    let mut predicted = Vec::new();
    let mut failed = Vec::new();
    for game in games {
        let outcome: Result<Prediction> = match model {
            Some(model) => ml::predict(league, model, &game.home, &game.away, game.neutral_site, injuries)
                .map(|r| r.prediction),
            None => football_scoring::predict(league, &game.home, &game.away, game.neutral_site, injuries)
                .map(|r| r.prediction)
                .map_err(Into::into),
        };
        match outcome {
            Ok(p) => predicted.push(BatchPrediction::from(p)),
            Err(err) => {
                warn!(home = %game.home, away = %game.away, error = %err, "game not predicted");
                failed.push(FailedGame {
                    home_team: game.home.clone(),
                    away_team: game.away.clone(),
                    is_neutral: game.neutral_site,
                    reason: err.to_string(),
                });
            }
        }
    }
    (predicted, failed)
}

/// Console summary with the predicted winner marked.
pub fn render_summary(result: &BatchResult) -> String {
    let rule = "=".repeat(100);
    let s = &result.summary;
    let mut out = String::new();
    let _ = writeln!(out, "{rule}\nPREDICTIONS SUMMARY - WEEK {}", s.week);
    let _ = writeln!(out, "Successfully predicted: {}/{} games\n{rule}\n", s.predicted_games, s.total_games);
    for (i, p) in result.predictions.iter().enumerate() {
        let marker = |team: &str| if p.winner == team { ">>>" } else { "   " };
        let neutral = if p.is_neutral { " [NEUTRAL]" } else { "" };
        let _ = writeln!(out, "Game {}:{neutral}", i + 1);
        let _ = writeln!(out, "  {} {}\n  @\n  {} {}", marker(&p.away_team), p.away_team, marker(&p.home_team), p.home_team);
        let _ = writeln!(out, "  PREDICTION: {} wins ({:.0}% confidence)", p.winner, p.confidence);
        let _ = writeln!(
            out,
            "  Score: {} {:.1} - {:.1} {}\n",
            p.home_team, p.home_points, p.away_points, p.away_team
        );
    }
    render_failures(&mut out, &result.failed_games, "[NEUTRAL]");
    out
}

/// Contents of `predictions_<sport>_week_<N>.txt`.
pub fn render_report(result: &BatchResult) -> String {
    let rule = "=".repeat(100);
    let s = &result.summary;
    let mut out = String::new();
    let _ = writeln!(out, "{} PREDICTIONS - WEEK {}", s.sport.label(), s.week);
    let _ = writeln!(out, "Successfully predicted: {}/{} games", s.predicted_games, s.total_games);
    let _ = writeln!(out, "{rule}\n");
    for (i, p) in result.predictions.iter().enumerate() {
        let neutral = if p.is_neutral { " [NEUTRAL SITE]" } else { "" };
        let _ = writeln!(out, "Game {}: {} @ {}{neutral}", i + 1, p.away_team, p.home_team);
        let _ = writeln!(out, "  PREDICTION: {} wins", p.winner);
        let _ = writeln!(out, "  Confidence: {:.0}%", p.confidence);
        let _ = writeln!(
            out,
            "  Points: {} {:.1} - {:.1} {}\n",
            p.home_team, p.home_points, p.away_points, p.away_team
        );
    }
    if !result.failed_games.is_empty() {
        out.push('\n');
    }
    render_failures(&mut out, &result.failed_games, "[NEUTRAL SITE]");
    out
}

fn render_failures(out: &mut String, failed: &[FailedGame], neutral_tag: &str) {
    if failed.is_empty() {
        return;
    }
    let rule = "=".repeat(100);
    let _ = writeln!(out, "{rule}\nGAMES THAT COULD NOT BE PREDICTED ({}):\n{rule}\n", failed.len());
    for (i, f) in failed.iter().enumerate() {
        let neutral = if f.is_neutral { format!(" {neutral_tag}") } else { String::new() };
        let _ = writeln!(out, "{}. {} @ {}{neutral}", i + 1, f.away_team, f.home_team);
        let _ = writeln!(out, "   Reason: {}\n", f.reason);
    }
}

fn write_report(path: &Path, result: &BatchResult) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    fs::write(path, render_report(result)).with_context(|| format!("write {}", path.display()))
}

fn prediction_rows(result: &BatchResult) -> Vec<Vec<String>> {
    let mut rows = vec![
        [
            "game", "away_team", "home_team", "neutral", "method", "home_points", "away_points",
            "winner", "confidence", "home_win_probability",
        ]
        .map(str::to_string)
        .to_vec(),
    ];
    for (i, p) in result.predictions.iter().enumerate() {
        rows.push(vec![
            (i + 1).to_string(),
            p.away_team.clone(),
            p.home_team.clone(),
            p.is_neutral.to_string(),
            format!("{:?}", p.method).to_lowercase(),
            format!("{:.1}", p.home_points),
            format!("{:.1}", p.away_points),
            p.winner.clone(),
            format!("{:.0}", p.confidence),
            p.home_win_probability.map(|v| format!("{v:.3}")).unwrap_or_default(),
        ]);
    }
    rows
}

fn failure_rows(result: &BatchResult) -> Vec<Vec<String>> {
    let mut rows = vec![
        ["away_team", "home_team", "neutral", "reason"]
            .map(str::to_string)
            .to_vec(),
    ];
    for f in &result.failed_games {
        rows.push(vec![
            f.away_team.clone(),
            f.home_team.clone(),
            f.is_neutral.to_string(),
            f.reason.clone(),
        ]);
    }
    rows
}

pub fn write_workbook(path: &Path, result: &BatchResult) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Predictions")?;
        write_rows(sheet, &prediction_rows(result))?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Failed")?;
        write_rows(sheet, &failure_rows(result))?;
    }
    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;
    Ok(())
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(sport: Sport, week: u32, phase: SeasonPhase) -> BatchRequest {
        BatchRequest {
            sport,
            week,
            phase,
            use_ml: false,
        }
    }

    #[test]
    fn playoff_weeks_force_postseason() {
        let r = request(Sport::Nfl, 20, SeasonPhase::Regular);
        let bucket = week_bucket(&r).unwrap();
        assert_eq!(bucket.phase, SeasonPhase::Postseason);
        assert_eq!(bucket.week, Some(2));
        assert_eq!(effective_season_type(&r), "postseason");
    }

    #[test]
    fn week_ranges_are_checked() {
        assert!(week_bucket(&request(Sport::Nfl, 0, SeasonPhase::Regular)).is_err());
        assert!(week_bucket(&request(Sport::Nfl, 23, SeasonPhase::Regular)).is_err());
        assert!(week_bucket(&request(Sport::Cfb, 0, SeasonPhase::Regular)).is_ok());
        assert!(week_bucket(&request(Sport::Mlb, 3, SeasonPhase::Regular)).is_err());
    }

    #[test]
    fn season_types() {
        assert_eq!(parse_season_type("").unwrap(), SeasonPhase::Regular);
        assert_eq!(parse_season_type("Preseason").unwrap(), SeasonPhase::Preseason);
        assert!(parse_season_type("spring").is_err());
    }

    #[test]
    fn report_lists_predictions_and_failures() {
        let result = BatchResult {
            predictions: vec![BatchPrediction {
                home_team: "Bears".to_string(),
                away_team: "Lions".to_string(),
                home_points: 12.5,
                away_points: 9.0,
                winner: "Bears".to_string(),
                confidence: 58.3,
                is_neutral: false,
                method: Method::Heuristic,
                home_win_probability: None,
                status: "predicted",
            }],
            failed_games: vec![FailedGame {
                home_team: "Jets".to_string(),
                away_team: "Bills".to_string(),
                is_neutral: true,
                reason: "unknown teams: Jets".to_string(),
            }],
            summary: BatchSummary {
                sport: Sport::Nfl,
                week: 5,
                season_type: "regular".to_string(),
                total_games: 2,
                predicted_games: 1,
                timestamp: String::new(),
                report_file: None,
                workbook_file: None,
            },
        };
        let text = render_report(&result);
        assert!(text.starts_with("NFL PREDICTIONS - WEEK 5\nSuccessfully predicted: 1/2 games"));
        assert!(text.contains("Game 1: Lions @ Bears\n  PREDICTION: Bears wins\n  Confidence: 58%"));
        assert!(text.contains("1. Bills @ Jets [NEUTRAL SITE]\n   Reason: unknown teams: Jets"));
        assert!(render_summary(&result).contains(">>> Bears"));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");
        write_workbook(&path, &result).unwrap();
        assert!(path.exists());
    }
}
