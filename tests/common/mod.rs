#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use serde_json::{Value, json};

use sports_predictor::config::Config;
use sports_predictor::espn::{Bucket, GameSource};
use sports_predictor::model::{BoxScore, FootballBox, QbLine, SeasonPhase, StoredGame, TeamLine};
use sports_predictor::sport::Sport;

pub const TEAMS: [&str; 6] = [
    "Kansas City Chiefs",
    "Baltimore Ravens",
    "Philadelphia Eagles",
    "Green Bay Packers",
    "Dallas Cowboys",
    "Cleveland Browns",
];

pub fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

pub fn fixture_json(name: &str) -> Value {
    serde_json::from_str(&read_fixture(name)).expect("fixture should be valid json")
}

/// Config rooted in `dir` with no courtesy delays and no HTTP cache.
pub fn test_config(dir: &Path) -> Config {
    let mut config = Config::with_data_dir(dir);
    config.season = 2025;
    config.http.game_delay_ms = 0;
    config.http.bucket_delay_ms = 0;
    config.http.use_cache = false;
    config
}

fn football_line(name: &str, score: u32, strength: f64) -> TeamLine {
    let passing = 180.0 + strength * 25.0 + score as f64 * 2.0;
    let rushing = 90.0 + strength * 10.0;
    TeamLine {
        name: name.to_string(),
        score,
        stats: BoxScore::Football(FootballBox {
            total_yards: passing + rushing,
            yards_per_play: (passing + rushing) / 62.0,
            possession_minutes: 28.0 + strength,
            passing_yards: passing,
            completion_rate: 0.58 + strength * 0.02,
            rushing_yards: rushing,
            rushing_avg: 3.8 + strength * 0.2,
            first_downs: 17.0 + strength,
            third_down_rate: 0.35 + strength * 0.02,
            fourth_down_rate: 0.5,
            red_zone_rate: 0.5 + strength * 0.03,
            turnovers: (3.0 - strength).max(0.0),
            interceptions: (2.0 - strength * 0.5).max(0.0),
            fumbles: 1.0,
            sacks: 2.0,
            penalties: 6.0,
        }),
        qb: Some(QbLine {
            name: format!("{name} QB"),
            completions: 20,
            attempts: 32,
            yards: passing,
            tds: 1.0 + strength * 0.5,
            ints: (2.0 - strength * 0.5).max(0.0),
            ypa: passing / 32.0,
            rating: 75.0 + strength * 6.0,
        }),
    }
}

/// Strength by list position: the first team is the best.
fn strength(team: &str) -> f64 {
    let idx = TEAMS.iter().position(|t| *t == team).unwrap_or(TEAMS.len());
    (TEAMS.len() - idx) as f64
}

pub fn football_game(event_id: &str, week: u32, home: &str, away: &str, neutral: bool) -> StoredGame {
    let (hs, as_) = (strength(home), strength(away));
    // the stronger side wins; the margin grows with the gap and a little with the week
    let home_score = 17 + (hs * 3.0) as u32 + week % 3;
    let away_score = 17 + (as_ * 3.0) as u32 + (week + 1) % 2;
    let away_score = if home_score == away_score { away_score + 3 } else { away_score };
    StoredGame {
        sport: Sport::Nfl,
        event_id: event_id.to_string(),
        phase: SeasonPhase::Regular,
        week: Some(week),
        date: None,
        neutral_site: neutral,
        home: football_line(home, home_score, hs),
        away: football_line(away, away_score, as_),
    }
}

/// A double round robin: every team hosts every other team once, one week per pairing slot.
pub fn nfl_season() -> Vec<StoredGame> {
    let mut games = Vec::new();
    let mut week = 1;
    let mut id = 1000;
    for home in TEAMS {
        for away in TEAMS {
            if home == away {
                continue;
            }
            id += 1;
            games.push(football_game(&id.to_string(), week, home, away, false));
            if id % 3 == 0 {
                week += 1;
            }
        }
    }
    games
}

fn stat(name: &str, value: String) -> Value {
    json!({ "name": name, "displayValue": value })
}

fn competitor(line: &TeamLine, side: &str) -> Value {
    json!({
        "homeAway": side,
        "score": line.score.to_string(),
        "team": { "displayName": line.name },
    })
}

/// The ESPN summary document a stored football game would have been parsed from.
pub fn summary_json(game: &StoredGame) -> Value {
    let team_stats = |line: &TeamLine| {
        let BoxScore::Football(b) = &line.stats else {
            return json!({ "team": { "displayName": line.name }, "statistics": [] });
        };
        json!({
            "team": { "displayName": line.name },
            "statistics": [
                stat("totalYards", format!("{:.0}", b.total_yards)),
                stat("netPassingYards", format!("{:.0}", b.passing_yards)),
                stat("rushingYards", format!("{:.0}", b.rushing_yards)),
                stat("completionAttempts", "20-32".to_string()),
                stat("thirdDownEff", "5-13".to_string()),
                stat("turnovers", format!("{:.0}", b.turnovers)),
                stat("possessionTime", "30:00".to_string()),
            ],
        })
    };
    json!({
        "header": {
            "competitions": [{
                "neutralSite": game.neutral_site,
                "competitors": [competitor(&game.home, "home"), competitor(&game.away, "away")],
            }]
        },
        "boxscore": { "teams": [team_stats(&game.home), team_stats(&game.away)] },
    })
}

pub fn scoreboard_json(games: &[(&StoredGame, bool)]) -> Value {
    let events: Vec<Value> = games
        .iter()
        .map(|(game, completed)| {
            json!({
                "id": game.event_id,
                "season": { "type": 2 },
                "status": { "type": { "name": if *completed { "STATUS_FINAL" } else { "STATUS_SCHEDULED" } } },
                "competitions": [{
                    "neutralSite": game.neutral_site,
                    "competitors": [competitor(&game.home, "home"), competitor(&game.away, "away")],
                }],
            })
        })
        .collect();
    json!({ "events": events })
}

/// In-memory scoreboards keyed by bucket label, summaries keyed by event id and one injury list.
#[derive(Default)]
pub struct FakeSource {
    pub scoreboards: HashMap<String, Value>,
    pub summaries: HashMap<String, Value>,
    pub injuries: Option<Value>,
}

impl FakeSource {
    /// Every game completed, one scoreboard per regular-season week.
    pub fn from_games(games: &[StoredGame]) -> Self {
        let mut source = Self::default();
        let mut by_week: HashMap<u32, Vec<&StoredGame>> = HashMap::new();
        for game in games {
            by_week.entry(game.week.unwrap_or(0)).or_default().push(game);
            source
                .summaries
                .insert(game.event_id.clone(), summary_json(game));
        }
        for (week, games) in by_week {
            let entries: Vec<(&StoredGame, bool)> = games.into_iter().map(|g| (g, true)).collect();
            source.scoreboards.insert(
                Bucket::week(SeasonPhase::Regular, week).label(),
                scoreboard_json(&entries),
            );
        }
        source
    }
}

impl GameSource for FakeSource {
    fn scoreboard(&self, _sport: Sport, _season: i32, bucket: &Bucket) -> Result<Value> {
        Ok(self
            .scoreboards
            .get(&bucket.label())
            .cloned()
            .unwrap_or_else(|| json!({ "events": [] })))
    }

    fn summary(&self, _sport: Sport, event_id: &str) -> Result<Value> {
        self.summaries
            .get(event_id)
            .cloned()
            .ok_or_else(|| anyhow!("no summary for event {event_id}"))
    }

    fn injuries(&self, _sport: Sport) -> Result<Value> {
        self.injuries
            .clone()
            .ok_or_else(|| anyhow!("injury endpoint unavailable"))
    }
}
