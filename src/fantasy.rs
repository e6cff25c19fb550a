//! Fantasy-style NFL rankings built from stored box scores.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::model::{FootballTeams, SeasonPhase};

const TOP_OFFENSES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QbRanking {
    pub name: String,
    pub team: String,
    pub games: usize,
    pub avg_yards: f64,
    pub avg_tds: f64,
    pub avg_ints: f64,
    pub completion_pct: f64,
    pub avg_rating: f64,
    pub fantasy_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamOffense {
    pub team: String,
    pub games: usize,
    pub avg_rushing_yds: f64,
    pub avg_passing_yds: f64,
    pub avg_points: f64,
    pub rb_score: f64,
    pub wr_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OffenseRankings {
    pub teams: Vec<TeamOffense>,
    pub rb_rankings: Vec<TeamOffense>,
    pub wr_rankings: Vec<TeamOffense>,
}

#[derive(Default)]
struct QbTotals {
    team: String,
    games: usize,
    yards: f64,
    tds: f64,
    ints: f64,
    completions: u32,
    attempts: u32,
    rating_sum: f64,
    rated_games: usize,
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn fantasy_points(yards: f64, tds: f64, ints: f64) -> f64 {
    yards / 25.0 + tds * 4.0 - ints * 2.0
}

/// Regular-season passers, best fantasy score first.
pub fn qb_rankings(teams: &FootballTeams) -> Vec<QbRanking> {
    let mut totals: BTreeMap<String, QbTotals> = BTreeMap::new();
    for (team, games) in teams {
        for game in games.iter().filter(|g| g.phase == SeasonPhase::Regular) {
            let Some(qb) = &game.stats.qb else { continue };
            if qb.name.is_empty() {
                continue;
            }
            let t = totals.entry(qb.name.clone()).or_default();
            // a traded passer is listed with his latest club
            t.team = team.clone();
            t.games += 1;
            t.yards += qb.yards;
            t.tds += qb.tds;
            t.ints += qb.ints;
            t.completions += qb.completions;
            t.attempts += qb.attempts;
            if qb.rating > 0.0 {
                t.rating_sum += qb.rating;
                t.rated_games += 1;
            }
        }
    }

    let mut out: Vec<QbRanking> = totals
        .into_iter()
        .map(|(name, t)| {
            let n = t.games as f64;
            let (yards, tds, ints) = (t.yards / n, t.tds / n, t.ints / n);
            QbRanking {
                name,
                team: t.team,
                games: t.games,
                avg_yards: round1(yards),
                avg_tds: round1(tds),
                avg_ints: round1(ints),
                completion_pct: if t.attempts > 0 {
                    round1(t.completions as f64 / t.attempts as f64 * 100.0)
                } else {
                    0.0
                },
                avg_rating: if t.rated_games > 0 {
                    round1(t.rating_sum / t.rated_games as f64)
                } else {
                    0.0
                },
                fantasy_score: round1(fantasy_points(yards, tds, ints)),
            }
        })
        .collect();
    out.sort_by(|a, b| b.fantasy_score.total_cmp(&a.fantasy_score));
    out
}

pub fn team_offense(teams: &FootballTeams) -> OffenseRankings {
    let mut rows: Vec<TeamOffense> = teams
        .iter()
        .filter_map(|(team, games)| {
            let counted: Vec<_> = games
                .iter()
                .filter(|g| g.phase != SeasonPhase::Preseason)
                .collect();
            if counted.is_empty() {
                return None;
            }
            let n = counted.len() as f64;
            let rush = counted.iter().map(|g| g.stats.off.rushing_yards).sum::<f64>() / n;
            let pass = counted.iter().map(|g| g.stats.off.passing_yards).sum::<f64>() / n;
            let pts = counted.iter().map(|g| g.score_for as f64).sum::<f64>() / n;
            Some(TeamOffense {
                team: team.clone(),
                games: counted.len(),
                avg_rushing_yds: round1(rush),
                avg_passing_yds: round1(pass),
                avg_points: round1(pts),
                rb_score: round1(rush + 2.0 * pts),
                wr_score: round1(pass + 2.0 * pts),
            })
        })
        .collect();
    rows.sort_by(|a, b| b.avg_points.total_cmp(&a.avg_points));

    let top = |key: fn(&TeamOffense) -> f64| {
        let mut ranked = rows.clone();
        ranked.sort_by(|a, b| key(b).total_cmp(&key(a)));
        ranked.truncate(TOP_OFFENSES);
        ranked
    };
    OffenseRankings {
        rb_rankings: top(|t| t.rb_score),
        wr_rankings: top(|t| t.wr_score),
        teams: rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FootballBox, FootballGame, FootballSides, GameResult, Location, QbLine};

    fn game(phase: SeasonPhase, points: u32, rush: f64, pass: f64, qb: Option<QbLine>) -> FootballGame {
        FootballGame {
            opponent: "Opp".to_string(),
            location: Location::Home,
            result: GameResult::Win,
            score_for: points,
            score_against: 0,
            phase,
            week: Some(1),
            stats: FootballSides {
                off: FootballBox {
                    rushing_yards: rush,
                    passing_yards: pass,
                    ..FootballBox::default()
                },
                def: FootballBox::default(),
                qb,
            },
        }
    }

    fn qb(name: &str, yards: f64, tds: f64, ints: f64, rating: f64) -> Option<QbLine> {
        Some(QbLine {
            name: name.to_string(),
            completions: 20,
            attempts: 30,
            yards,
            tds,
            ints,
            ypa: yards / 30.0,
            rating,
        })
    }

    #[test]
    fn qb_scores_use_regular_season_only() {
        let mut teams = FootballTeams::new();
        teams.insert(
            "Bills".to_string(),
            vec![
                game(SeasonPhase::Regular, 30, 100.0, 300.0, qb("Allen", 300.0, 3.0, 1.0, 110.0)),
                game(SeasonPhase::Regular, 20, 100.0, 200.0, qb("Allen", 200.0, 1.0, 0.0, 0.0)),
                game(SeasonPhase::Postseason, 40, 100.0, 400.0, qb("Allen", 400.0, 4.0, 0.0, 130.0)),
            ],
        );
        teams.insert(
            "Jets".to_string(),
            vec![game(SeasonPhase::Regular, 10, 50.0, 150.0, qb("Backup", 150.0, 0.0, 2.0, 60.0))],
        );
        let ranked = qb_rankings(&teams);
        assert_eq!(ranked[0].name, "Allen");
        assert_eq!(ranked[0].games, 2);
        assert_eq!(ranked[0].avg_yards, 250.0);
        // 250/25 + 2*4 - 0.5*2
        assert_eq!(ranked[0].fantasy_score, 17.0);
        // zero ratings are left out of the average
        assert_eq!(ranked[0].avg_rating, 110.0);
        assert_eq!(ranked[0].completion_pct, 66.7);
        assert_eq!(ranked[1].fantasy_score, 2.0);
    }

    #[test]
    fn offense_rankings() {
        let mut teams = FootballTeams::new();
        teams.insert("Run".to_string(), vec![game(SeasonPhase::Regular, 20, 200.0, 100.0, None)]);
        teams.insert(
            "Pass".to_string(),
            vec![
                game(SeasonPhase::Regular, 24, 60.0, 320.0, None),
                game(SeasonPhase::Preseason, 3, 0.0, 0.0, None),
            ],
        );
        let r = team_offense(&teams);
        assert_eq!(r.teams.len(), 2);
        assert_eq!(r.teams[0].team, "Pass");
        assert_eq!(r.teams[0].games, 1);
        assert_eq!(r.rb_rankings[0].team, "Run");
        assert_eq!(r.rb_rankings[0].rb_score, 240.0);
        assert_eq!(r.wr_rankings[0].team, "Pass");
        assert_eq!(r.wr_rankings[0].wr_score, 368.0);
    }
}
