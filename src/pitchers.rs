//! Starting pitcher quality and a bullpen estimate from team run prevention.

use anyhow::{Result, anyhow};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http_cache::{build_url, fetch_json};
use crate::model::BaseballGame;

const CORE_API: &str = "https://sports.core.api.espn.com/v2/sports/baseball/leagues/mlb";
const AVERAGE_SCORE: f64 = 50.0;
/// Relievers typically run about half a run worse than the staff as a whole.
const BULLPEN_ERA_PREMIUM: f64 = 0.5;
const DEFAULT_BULLPEN_ERA: f64 = 4.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitcherStats {
    pub era: f64,
    pub whip: f64,
    pub wins: u32,
    pub losses: u32,
    pub innings: f64,
    pub strikeouts: u32,
    pub walks: u32,
    pub hits_allowed: u32,
    pub hr_allowed: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bullpen {
    pub quality_score: f64,
    pub era: f64,
}

/// Reference pitchers for manual matchups when no live stats are at hand.
pub fn sample_pitcher(name: &str) -> Option<PitcherStats> {
    let stats = match name.trim() {
        "Gerrit Cole" => PitcherStats {
            era: 2.63,
            whip: 1.03,
            wins: 15,
            losses: 4,
            innings: 187.1,
            strikeouts: 222,
            walks: 41,
            hits_allowed: 148,
            hr_allowed: 18,
        },
        "Average Pitcher" => PitcherStats {
            era: 4.20,
            whip: 1.35,
            wins: 9,
            losses: 9,
            innings: 150.0,
            strikeouts: 130,
            walks: 55,
            hits_allowed: 155,
            hr_allowed: 22,
        },
        "Weak Pitcher" => PitcherStats {
            era: 5.85,
            whip: 1.62,
            wins: 4,
            losses: 12,
            innings: 120.0,
            strikeouts: 85,
            walks: 62,
            hits_allowed: 145,
            hr_allowed: 28,
        },
        _ => return None,
    };
    Some(stats)
}

pub const SAMPLE_PITCHERS: [&str; 3] = ["Gerrit Cole", "Average Pitcher", "Weak Pitcher"];

/// 0–100, 50 is a league-average starter.
pub fn quality_score(stats: &PitcherStats) -> f64 {
    let mut score = AVERAGE_SCORE;

    score += match stats.era {
        e if e < 2.5 => 20.0,
        e if e < 3.5 => 10.0,
        e if e < 4.0 => 5.0,
        e if e > 5.5 => -15.0,
        e if e > 4.5 => -5.0,
        _ => 0.0,
    };

    score += match stats.whip {
        w if w < 1.0 => 15.0,
        w if w < 1.2 => 8.0,
        w if w > 1.5 => -10.0,
        w if w > 1.4 => -5.0,
        _ => 0.0,
    };

    let decisions = stats.wins + stats.losses;
    if decisions > 0 {
        score += match stats.wins as f64 / decisions as f64 {
            p if p > 0.65 => 10.0,
            p if p > 0.55 => 5.0,
            p if p < 0.35 => -10.0,
            p if p < 0.45 => -5.0,
            _ => 0.0,
        };
    }

    let k9 = if stats.innings > 0.0 {
        stats.strikeouts as f64 / stats.innings * 9.0
    } else {
        0.0
    };
    score += match k9 {
        k if k > 10.0 => 8.0,
        k if k > 8.5 => 4.0,
        k if k < 6.0 => -5.0,
        _ => 0.0,
    };

    score.clamp(0.0, 100.0)
}

/// Points the home starter is worth over the away starter; negative favours the away side.
pub fn compare(home: &PitcherStats, away: &PitcherStats) -> (f64, &'static str) {
    let diff = quality_score(home) - quality_score(away);
    let magnitude = diff.abs();
    let points = if magnitude >= 30.0 {
        5.0
    } else if magnitude >= 20.0 {
        3.5
    } else if magnitude >= 10.0 {
        2.0
    } else if magnitude >= 5.0 {
        1.0
    } else {
        return (0.0, "Pitchers evenly matched");
    };
    let note = match (diff > 0.0, points) {
        (true, p) if p >= 5.0 => "Home pitcher significantly better (ace vs weak)",
        (true, p) if p >= 3.5 => "Home pitcher much better",
        (true, p) if p >= 2.0 => "Home pitcher better",
        (true, _) => "Home pitcher slightly better",
        (false, p) if p >= 5.0 => "Away pitcher significantly better (ace vs weak)",
        (false, p) if p >= 3.5 => "Away pitcher much better",
        (false, p) if p >= 2.0 => "Away pitcher better",
        (false, _) => "Away pitcher slightly better",
    };
    (if diff > 0.0 { points } else { -points }, note)
}

/// Bullpen quality estimated from the team's average runs allowed.
pub fn bullpen(games: &[BaseballGame]) -> Bullpen {
    if games.is_empty() {
        return Bullpen {
            quality_score: AVERAGE_SCORE,
            era: DEFAULT_BULLPEN_ERA,
        };
    }
    let runs_allowed =
        games.iter().map(|g| g.score_against as f64).sum::<f64>() / games.len() as f64;
    let era = runs_allowed + BULLPEN_ERA_PREMIUM;
    let quality_score = match era {
        e if e < 3.0 => 80.0,
        e if e < 3.5 => 70.0,
        e if e < 4.0 => 60.0,
        e if e < 4.5 => 50.0,
        e if e < 5.0 => 40.0,
        _ => 30.0,
    };
    Bullpen { quality_score, era }
}

/// Season pitching line from an ESPN core-API statistics document.
pub fn parse_pitching(root: &Value) -> Option<PitcherStats> {
    let category = root
        .pointer("/splits/categories")?
        .as_array()?
        .iter()
        .find(|c| c.get("name").and_then(Value::as_str) == Some("pitching"))?;
    let stats = category.get("stats")?.as_array()?;
    let value = |name: &str| {
        stats
            .iter()
            .find(|s| s.get("name").and_then(Value::as_str) == Some(name))
            .and_then(|s| s.get("value"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    };
    let count = |name: &str| value(name).max(0.0).round() as u32;

    Some(PitcherStats {
        era: value("earnedRunAverage"),
        whip: value("walksAndHitsPerInningPitched"),
        wins: count("wins"),
        losses: count("losses"),
        innings: value("inningsPitched"),
        strikeouts: count("strikeouts"),
        walks: count("walks"),
        hits_allowed: count("hits"),
        hr_allowed: count("homeRunsAllowed"),
    })
}

/// Live season stats for an athlete id. The athlete document links to its statistics.
pub fn fetch(client: &Client, season: i32, athlete_id: &str) -> Result<Option<PitcherStats>> {
    let url = build_url(&format!("{CORE_API}/seasons/{season}/athletes/{athlete_id}"), &[])?;
    let athlete = fetch_json(client, &url, None)?;
    let Some(stats_ref) = athlete.pointer("/statistics/$ref").and_then(Value::as_str) else {
        return Ok(None);
    };
    let stats_url = reqwest::Url::parse(stats_ref)
        .map_err(|err| anyhow!("bad statistics link for athlete {athlete_id}: {err}"))?;
    let stats = fetch_json(client, &stats_url, None)?;
    Ok(parse_pitching(&stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sample_pitchers_score_as_expected() {
        let ace = sample_pitcher("Gerrit Cole").unwrap();
        let avg = sample_pitcher("Average Pitcher").unwrap();
        let weak = sample_pitcher("Weak Pitcher").unwrap();
        // era +10, whip +8, record +10, k/9 10.7 +8
        assert_eq!(quality_score(&ace), 86.0);
        assert_eq!(quality_score(&avg), 50.0);
        // era -15, whip -10, record -10, k/9 6.4 +0
        assert_eq!(quality_score(&weak), 15.0);
    }

    #[test]
    fn ace_against_weak_starter() {
        let ace = sample_pitcher("Gerrit Cole").unwrap();
        let weak = sample_pitcher("Weak Pitcher").unwrap();
        assert_eq!(compare(&ace, &weak).0, 5.0);
        assert_eq!(compare(&weak, &ace).0, -5.0);
        let avg = sample_pitcher("Average Pitcher").unwrap();
        assert_eq!(compare(&avg, &avg).0, 0.0);
    }

    #[test]
    fn bullpen_without_games_is_average() {
        let b = bullpen(&[]);
        assert_eq!(b.quality_score, 50.0);
        assert_eq!(b.era, 4.0);
    }

    #[test]
    fn parses_core_api_pitching_split() {
        let root = json!({
            "splits": {"categories": [
                {"name": "batting", "stats": []},
                {"name": "pitching", "stats": [
                    {"name": "earnedRunAverage", "value": 3.12},
                    {"name": "walksAndHitsPerInningPitched", "value": 1.08},
                    {"name": "wins", "value": 11.0},
                    {"name": "losses", "value": 6.0},
                    {"name": "inningsPitched", "value": 160.2},
                    {"name": "strikeouts", "value": 171.0}
                ]}
            ]}
        });
        let p = parse_pitching(&root).unwrap();
        assert_eq!(p.wins, 11);
        assert_eq!(p.strikeouts, 171);
        assert_eq!(p.walks, 0);
    }
}
