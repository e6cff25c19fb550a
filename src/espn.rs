use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde_json::Value;

use crate::config::Config;
use crate::http_cache::{build_url, fetch_json};
use crate::http_client::configure_http_client;
use crate::model::{BaseballBox, BoxScore, FootballBox, QbLine, SeasonPhase, StoredGame, TeamLine};
use crate::sport::Sport;
use crate::stat_parse::{parse_clock_minutes, parse_count, parse_leading, parse_ratio, split_pair};

const SITE_API: &str = "https://site.api.espn.com/apis/site/v2/sports";
const FINAL_STATUS: &str = "STATUS_FINAL";
const FBS_GROUP: &str = "80";

/// The unit one scoreboard request covers: a football week or a baseball date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bucket {
    pub phase: SeasonPhase,
    pub week: Option<u32>,
    pub date: Option<NaiveDate>,
}

impl Bucket {
    pub fn week(phase: SeasonPhase, week: u32) -> Self {
        Self {
            phase,
            week: Some(week),
            date: None,
        }
    }

    pub fn day(date: NaiveDate) -> Self {
        Self {
            phase: SeasonPhase::Regular,
            week: None,
            date: Some(date),
        }
    }

    pub fn date_string(&self) -> Option<String> {
        self.date.map(|d| d.format("%Y-%m-%d").to_string())
    }

    pub fn label(&self) -> String {
        match (self.week, self.date_string()) {
            (Some(week), _) => format!("{}_WEEK_{week}", self.phase.label()),
            (None, Some(date)) => date,
            (None, None) => self.phase.label().to_string(),
        }
    }

    /// Same ordering key as `StoredGame::bucket_key`, so stored games can be matched to buckets.
    pub fn key(&self) -> (SeasonPhase, u32, String) {
        (
            self.phase,
            self.week.unwrap_or(0),
            self.date_string().unwrap_or_default(),
        )
    }

    fn query(&self, sport: Sport, season: i32) -> Vec<(&'static str, String)> {
        if let Some(date) = self.date {
            return vec![("dates", date.format("%Y%m%d").to_string())];
        }
        let mut query = vec![
            ("seasontype", self.phase.espn_season_type().to_string()),
            ("week", self.week.unwrap_or(1).to_string()),
            ("dates", season.to_string()),
        ];
        if sport == Sport::Cfb {
            query.push(("groups", FBS_GROUP.to_string()));
        }
        query
    }
}

/// One scoreboard event, finished or not.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledGame {
    pub event_id: String,
    pub home: String,
    pub away: String,
    pub neutral_site: bool,
    pub completed: bool,
    pub phase: Option<SeasonPhase>,
}

/// Where scoreboards, summaries and injury lists come from.
pub trait GameSource {
    fn scoreboard(&self, sport: Sport, season: i32, bucket: &Bucket) -> Result<Value>;
    fn summary(&self, sport: Sport, event_id: &str) -> Result<Value>;
    fn injuries(&self, sport: Sport) -> Result<Value>;
}

impl<T: GameSource + ?Sized> GameSource for Arc<T> {
    fn scoreboard(&self, sport: Sport, season: i32, bucket: &Bucket) -> Result<Value> {
        (**self).scoreboard(sport, season, bucket)
    }

    fn summary(&self, sport: Sport, event_id: &str) -> Result<Value> {
        (**self).summary(sport, event_id)
    }

    fn injuries(&self, sport: Sport) -> Result<Value> {
        (**self).injuries(sport)
    }
}

pub struct EspnClient {
    client: &'static Client,
    cache: Option<PathBuf>,
}

impl EspnClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = configure_http_client(config.http_timeout())?;
        let cache = config
            .http
            .use_cache
            .then(|| config.data_dir.join("http_cache.json"));
        Ok(Self { client, cache })
    }
}

impl GameSource for EspnClient {
    fn scoreboard(&self, sport: Sport, season: i32, bucket: &Bucket) -> Result<Value> {
        let url = build_url(
            &format!("{SITE_API}/{}/scoreboard", sport.espn_path()),
            &bucket.query(sport, season),
        )?;
        fetch_json(self.client, &url, self.cache.as_deref())
    }

    fn summary(&self, sport: Sport, event_id: &str) -> Result<Value> {
        let url = build_url(
            &format!("{SITE_API}/{}/summary", sport.espn_path()),
            &[("event", event_id.to_string())],
        )?;
        fetch_json(self.client, &url, self.cache.as_deref())
    }

    fn injuries(&self, sport: Sport) -> Result<Value> {
        let url = build_url(&format!("{SITE_API}/{}/injuries", sport.espn_path()), &[])?;
        // injury lists change hourly; never replay them from the cache
        fetch_json(self.client, &url, None)
    }
}

pub fn parse_scoreboard(root: &Value) -> Vec<ScheduledGame> {
    let Some(events) = root.get("events").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut games = Vec::new();
    for event in events {
        let Some(event_id) = pick_id(event) else {
            continue;
        };
        let Some(competition) = event
            .get("competitions")
            .and_then(Value::as_array)
            .and_then(|c| c.first())
        else {
            continue;
        };
        let competitors = competition
            .get("competitors")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        if competitors.len() < 2 {
            continue;
        }
        let (Some(home), Some(away)) = (
            side_name(competitors, "home"),
            side_name(competitors, "away"),
        ) else {
            continue;
        };
        let status = event
            .pointer("/status/type/name")
            .or_else(|| competition.pointer("/status/type/name"))
            .and_then(Value::as_str)
            .unwrap_or_default();

        games.push(ScheduledGame {
            event_id,
            home,
            away,
            neutral_site: competition
                .get("neutralSite")
                .or_else(|| competition.pointer("/venue/neutral"))
                .and_then(Value::as_bool)
                .unwrap_or(false),
            completed: status.eq_ignore_ascii_case(FINAL_STATUS),
            phase: event
                .pointer("/season/type")
                .and_then(Value::as_u64)
                .and_then(phase_from_season_type),
        });
    }
    games
}

pub fn completed_event_ids(root: &Value) -> Vec<String> {
    parse_scoreboard(root)
        .into_iter()
        .filter(|g| g.completed)
        .map(|g| g.event_id)
        .collect()
}

pub fn phase_from_season_type(value: u64) -> Option<SeasonPhase> {
    match value {
        1 => Some(SeasonPhase::Preseason),
        2 => Some(SeasonPhase::Regular),
        3 => Some(SeasonPhase::Postseason),
        _ => None,
    }
}

/// Flatten a game summary into a stored game. `phase` overrides the bucket phase when the
/// scoreboard reported one (baseball dates span spring training and the postseason).
pub fn parse_summary(
    sport: Sport,
    bucket: &Bucket,
    phase: Option<SeasonPhase>,
    event_id: &str,
    root: &Value,
) -> Result<StoredGame> {
    let competition = root
        .pointer("/header/competitions/0")
        .ok_or_else(|| anyhow!("event {event_id}: summary has no competition header"))?;
    let competitors = competition
        .get("competitors")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let (home_name, home_score) = header_side(competitors, "home")
        .ok_or_else(|| anyhow!("event {event_id}: missing home competitor"))?;
    let (away_name, away_score) = header_side(competitors, "away")
        .ok_or_else(|| anyhow!("event {event_id}: missing away competitor"))?;

    let box_stats = boxscore_stats(root);
    let home_stats = box_stats.get(&home_name).cloned().unwrap_or_default();
    let away_stats = box_stats.get(&away_name).cloned().unwrap_or_default();

    let (home_box, away_box, home_qb, away_qb) = if sport.is_football() {
        (
            BoxScore::Football(football_box(&home_stats)),
            BoxScore::Football(football_box(&away_stats)),
            qb_line(root, &home_name),
            qb_line(root, &away_name),
        )
    } else {
        (
            BoxScore::Baseball(baseball_box(&home_stats, home_score)),
            BoxScore::Baseball(baseball_box(&away_stats, away_score)),
            None,
            None,
        )
    };

    let date = bucket.date_string().or_else(|| {
        competition
            .get("date")
            .and_then(Value::as_str)
            .map(|d| d.chars().take(10).collect())
    });

    Ok(StoredGame {
        sport,
        event_id: event_id.to_string(),
        phase: phase.unwrap_or(bucket.phase),
        week: bucket.week,
        date: if bucket.week.is_some() { None } else { date },
        neutral_site: competition
            .get("neutralSite")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        home: TeamLine {
            name: home_name,
            score: home_score,
            stats: home_box,
            qb: home_qb,
        },
        away: TeamLine {
            name: away_name,
            score: away_score,
            stats: away_box,
            qb: away_qb,
        },
    })
}

pub fn football_box(stats: &HashMap<String, String>) -> FootballBox {
    let get = |name: &str| stats.get(name).map(String::as_str).unwrap_or_default();
    FootballBox {
        total_yards: parse_count(get("totalYards")),
        yards_per_play: parse_count(get("yardsPerPlay")),
        possession_minutes: parse_clock_minutes(get("possessionTime")),
        passing_yards: parse_count(get("netPassingYards")),
        completion_rate: parse_ratio(get("completionAttempts")),
        rushing_yards: parse_count(get("rushingYards")),
        rushing_avg: parse_count(get("yardsPerRushAttempt")),
        first_downs: parse_count(get("firstDowns")),
        third_down_rate: parse_ratio(get("thirdDownEff")),
        fourth_down_rate: parse_ratio(get("fourthDownEff")),
        red_zone_rate: parse_ratio(get("redZoneAttempts")),
        turnovers: parse_count(get("turnovers")),
        interceptions: parse_count(get("interceptions")),
        fumbles: parse_count(get("fumblesLost")),
        sacks: parse_leading(get("sacksYardsLost")),
        penalties: parse_leading(get("totalPenaltiesYards")),
    }
}

pub fn baseball_box(stats: &HashMap<String, String>, score: u32) -> BaseballBox {
    let get = |names: &[&str]| {
        names
            .iter()
            .find_map(|n| stats.get(*n))
            .map(|v| parse_count(v))
            .unwrap_or(0.0)
    };
    let runs = get(&["runs", "R"]);
    BaseballBox {
        runs: if runs > 0.0 { runs } else { score as f64 },
        hits: get(&["hits", "H"]),
        errors: get(&["errors", "E"]),
        avg: get(&["avg"]),
        obp: get(&["obp", "onBasePct"]),
        slg: get(&["slg", "slugAvg"]),
        home_runs: get(&["homeRuns", "HR"]),
        rbi: get(&["rbi", "RBIs", "RBI"]),
        left_on_base: get(&["leftOnBase", "LOB"]),
    }
}

/// `boxscore.teams[].statistics[]` as team name -> stat name -> display value. Grouped
/// statistics (baseball) are flattened; the first occurrence of a name wins.
fn boxscore_stats(root: &Value) -> HashMap<String, HashMap<String, String>> {
    let mut out = HashMap::new();
    let Some(teams) = root.pointer("/boxscore/teams").and_then(Value::as_array) else {
        return out;
    };
    for team in teams {
        let Some(name) = team.pointer("/team/displayName").and_then(Value::as_str) else {
            continue;
        };
        let mut stats = HashMap::new();
        if let Some(entries) = team.get("statistics").and_then(Value::as_array) {
            collect_stats(entries, &mut stats);
        }
        out.insert(name.to_string(), stats);
    }
    out
}

fn collect_stats(entries: &[Value], stats: &mut HashMap<String, String>) {
    for entry in entries {
        if let Some(nested) = entry.get("stats").and_then(Value::as_array) {
            collect_stats(nested, stats);
            continue;
        }
        let Some(name) = entry.get("name").and_then(Value::as_str) else {
            continue;
        };
        let Some(value) = entry.get("displayValue").and_then(value_string) else {
            continue;
        };
        stats.entry(name.to_string()).or_insert(value);
    }
}

/// First passer listed for the team in `boxscore.players`.
fn qb_line(root: &Value, team_name: &str) -> Option<QbLine> {
    let players = root.pointer("/boxscore/players")?.as_array()?;
    let team = players
        .iter()
        .find(|p| p.pointer("/team/displayName").and_then(Value::as_str) == Some(team_name))?;
    let passing = team
        .get("statistics")?
        .as_array()?
        .iter()
        .find(|g| g.get("name").and_then(Value::as_str) == Some("passing"))?;
    let athlete = passing.get("athletes")?.as_array()?.first()?;
    let stats: Vec<String> = athlete
        .get("stats")?
        .as_array()?
        .iter()
        .filter_map(value_string)
        .collect();
    let labels: Vec<&str> = passing
        .get("labels")
        .and_then(Value::as_array)
        .map(|l| l.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let column = |label: &str, fallback: usize| -> String {
        let idx = labels
            .iter()
            .position(|l| l.eq_ignore_ascii_case(label))
            .unwrap_or(fallback);
        stats.get(idx).cloned().unwrap_or_default()
    };

    let (completions, attempts) = split_pair(&column("C/ATT", 0)).unwrap_or((0, 0));
    Some(QbLine {
        name: athlete
            .pointer("/athlete/displayName")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string(),
        completions,
        attempts,
        yards: parse_count(&column("YDS", 1)),
        ypa: parse_count(&column("AVG", 2)),
        tds: parse_count(&column("TD", 3)),
        ints: parse_count(&column("INT", 4)),
        rating: parse_count(&column("RTG", 7)),
    })
}

fn header_side(competitors: &[Value], side: &str) -> Option<(String, u32)> {
    let competitor = competitors
        .iter()
        .find(|c| c.get("homeAway").and_then(Value::as_str) == Some(side))?;
    let name = competitor.pointer("/team/displayName")?.as_str()?.to_string();
    let score = competitor
        .get("score")
        .and_then(value_string)
        .and_then(|s| s.trim().parse::<u32>().ok())
        .unwrap_or(0);
    Some((name, score))
}

fn side_name(competitors: &[Value], side: &str) -> Option<String> {
    competitors
        .iter()
        .find(|c| c.get("homeAway").and_then(Value::as_str) == Some(side))?
        .pointer("/team/displayName")?
        .as_str()
        .map(str::to_string)
}

fn pick_id(value: &Value) -> Option<String> {
    value.get("id").and_then(value_string)
}

fn value_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn parse_json(raw: &str) -> Result<Value> {
    serde_json::from_str(raw.trim()).context("invalid espn json")
}
