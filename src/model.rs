use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::sport::Sport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeasonPhase {
    Preseason,
    Regular,
    Postseason,
}

impl SeasonPhase {
    /// ESPN `seasontype` query value.
    pub fn espn_season_type(self) -> u8 {
        match self {
            SeasonPhase::Preseason => 1,
            SeasonPhase::Regular => 2,
            SeasonPhase::Postseason => 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SeasonPhase::Preseason => "PRESEASON",
            SeasonPhase::Regular => "REGULAR",
            SeasonPhase::Postseason => "POSTSEASON",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Home,
    Away,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    #[serde(rename = "W")]
    Win,
    #[serde(rename = "L")]
    Loss,
}

/// Team box score for one football game. Rates are fractions in `[0, 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FootballBox {
    pub total_yards: f64,
    pub yards_per_play: f64,
    pub possession_minutes: f64,
    pub passing_yards: f64,
    pub completion_rate: f64,
    pub rushing_yards: f64,
    pub rushing_avg: f64,
    pub first_downs: f64,
    pub third_down_rate: f64,
    pub fourth_down_rate: f64,
    pub red_zone_rate: f64,
    pub turnovers: f64,
    pub interceptions: f64,
    pub fumbles: f64,
    pub sacks: f64,
    pub penalties: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QbLine {
    pub name: String,
    pub completions: u32,
    pub attempts: u32,
    pub yards: f64,
    pub tds: f64,
    pub ints: f64,
    pub ypa: f64,
    pub rating: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseballBox {
    pub runs: f64,
    pub hits: f64,
    pub errors: f64,
    pub avg: f64,
    pub obp: f64,
    pub slg: f64,
    pub home_runs: f64,
    pub rbi: f64,
    pub left_on_base: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BoxScore {
    Football(FootballBox),
    Baseball(BaseballBox),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamLine {
    pub name: String,
    pub score: u32,
    pub stats: BoxScore,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qb: Option<QbLine>,
}

/// One completed game as persisted: one JSON object per line in the game store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredGame {
    pub sport: Sport,
    pub event_id: String,
    pub phase: SeasonPhase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub week: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub neutral_site: bool,
    pub home: TeamLine,
    pub away: TeamLine,
}

impl StoredGame {
    /// Human-readable bucket name, e.g. `REGULAR_WEEK_5` or `2024-06-01`.
    pub fn bucket_label(&self) -> String {
        match (self.week, self.date.as_deref()) {
            (Some(week), _) => format!("{}_WEEK_{week}", self.phase.label()),
            (None, Some(date)) => date.to_string(),
            (None, None) => self.phase.label().to_string(),
        }
    }

    pub fn bucket_key(&self) -> (SeasonPhase, u32, String) {
        (
            self.phase,
            self.week.unwrap_or(0),
            self.date.clone().unwrap_or_default(),
        )
    }

    pub fn is_tie(&self) -> bool {
        self.home.score == self.away.score
    }
}

/// Football stats from one team's perspective: `off` is its own box, `def` what it allowed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FootballSides {
    pub off: FootballBox,
    pub def: FootballBox,
    pub qb: Option<QbLine>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseballSides {
    pub batting: BaseballBox,
    pub opponent: BaseballBox,
}

/// One team's view of a completed game.
#[derive(Debug, Clone, PartialEq)]
pub struct GameRecord<S> {
    pub opponent: String,
    pub location: Location,
    pub result: GameResult,
    pub score_for: u32,
    pub score_against: u32,
    pub phase: SeasonPhase,
    pub week: Option<u32>,
    pub stats: S,
}

impl<S> GameRecord<S> {
    pub fn won(&self) -> bool {
        self.result == GameResult::Win
    }

    pub fn margin(&self) -> i64 {
        self.score_for as i64 - self.score_against as i64
    }

    pub fn point_diff(&self) -> u32 {
        self.score_for.abs_diff(self.score_against)
    }
}

pub type TeamsData<S> = BTreeMap<String, Vec<GameRecord<S>>>;
pub type FootballTeams = TeamsData<FootballSides>;
pub type BaseballTeams = TeamsData<BaseballSides>;
pub type FootballGame = GameRecord<FootballSides>;
pub type BaseballGame = GameRecord<BaseballSides>;
