//! Recency-weighted team summaries. Recomputed on every call, never persisted.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;

use crate::model::{BaseballGame, BaseballTeams, FootballGame, FootballTeams, Location, SeasonPhase};
use crate::sport::Sport;

const CLOSE_GAME_MARGIN: u32 = 7;
const LEAGUE_AVG_POINTS: f64 = 22.0;
const DEFAULT_QB_RATING: f64 = 85.0;
const YARDS_PER_COMPLETION: f64 = 7.5;

/// Oldest first. Weights grow as `base^(i/n)` and are normalised; short lists use a plain mean.
pub fn weighted_average(values: &[f64], base: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len();
    if n <= 3 {
        return values.iter().sum::<f64>() / n as f64;
    }
    let weights: Vec<f64> = (0..n).map(|i| base.powf(i as f64 / n as f64)).collect();
    let total: f64 = weights.iter().sum();
    values
        .iter()
        .zip(&weights)
        .map(|(v, w)| v * w / total)
        .sum()
}

pub fn pythagorean(scored: f64, allowed: f64, exponent: f64) -> f64 {
    let s = scored.max(0.0).powf(exponent);
    let a = allowed.max(0.0).powf(exponent);
    if s + a <= 0.0 {
        return 0.5;
    }
    s / (s + a)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecentForm {
    pub wins: usize,
    pub games: usize,
    pub win_rate: f64,
    pub points_scored: f64,
    pub points_allowed: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CloseGames {
    pub total: usize,
    pub wins: usize,
    pub win_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Splits {
    pub home_win_rate: f64,
    pub away_win_rate: f64,
    pub home_advantage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FootballOffense {
    pub yards_per_play: f64,
    pub total_yards: f64,
    pub points_scored: f64,
    pub third_down_rate: f64,
    pub fourth_down_rate: f64,
    pub red_zone_rate: f64,
    pub turnovers: f64,
    pub interceptions_thrown: f64,
    pub fumbles_lost: f64,
    pub rushing_yards: f64,
    pub rushing_avg: f64,
    pub passing_yards: f64,
    pub completion_rate: f64,
    pub yards_per_attempt: f64,
    pub td_int_ratio: f64,
    pub sack_rate: f64,
    pub sacks_made: f64,
    pub penalties: f64,
    pub epa_proxy: f64,
    pub explosive_pass_rate: f64,
    pub explosive_run_rate: f64,
    pub qb_rating: f64,
    pub qb_tds_per_game: f64,
    pub qb_ints_per_game: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FootballDefense {
    pub yards_allowed: f64,
    pub yards_per_play_allowed: f64,
    pub points_allowed: f64,
    pub sacks_allowed: f64,
    pub rushing_yards_allowed: f64,
    pub rushing_avg_allowed: f64,
    pub passing_yards_allowed: f64,
    pub completion_allowed: f64,
    pub red_zone_allowed: f64,
    pub third_down_allowed: f64,
    pub interceptions_forced: f64,
    pub explosive_pass_allowed: f64,
    pub explosive_run_allowed: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FootballAverages {
    pub games_played: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub pythagorean_win_rate: f64,
    pub offense: FootballOffense,
    pub defense: FootballDefense,
    pub recent_form: RecentForm,
    pub close_games: CloseGames,
    pub splits: Splits,
    pub turnover_margin: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BaseballBatting {
    pub runs_per_game: f64,
    pub avg: f64,
    pub obp: f64,
    pub slg: f64,
    pub ops: f64,
    pub hr_per_game: f64,
    pub hits_per_game: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BaseballPitching {
    pub runs_allowed_per_game: f64,
    pub hits_allowed_per_game: f64,
    pub errors_per_game: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BaseballAverages {
    pub games_played: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub pythagorean_win_rate: f64,
    pub batting: BaseballBatting,
    pub pitching: BaseballPitching,
    pub recent_form: RecentForm,
    pub splits: Splits,
    pub run_differential: f64,
}

/// Games that count toward a football profile: the NFL ignores preseason, college keeps
/// everything unless bowl games are excluded.
pub fn season_games(sport: Sport, games: &[FootballGame], exclude_postseason: bool) -> Vec<&FootballGame> {
    games
        .iter()
        .filter(|g| !(sport == Sport::Nfl && g.phase == SeasonPhase::Preseason))
        .filter(|g| !(exclude_postseason && g.phase == SeasonPhase::Postseason))
        .collect()
}

pub fn football_averages(sport: Sport, games: &[FootballGame]) -> Option<FootballAverages> {
    football_summary(sport, &season_games(sport, games, false))
}

pub fn football_averages_excluding_postseason(
    sport: Sport,
    games: &[FootballGame],
) -> Option<FootballAverages> {
    football_summary(sport, &season_games(sport, games, true))
}

pub fn football_team(sport: Sport, teams: &FootballTeams, team: &str) -> Option<FootballAverages> {
    football_averages(sport, teams.get(team)?)
}

/// Every team with at least one counted game.
pub fn league_football(sport: Sport, teams: &FootballTeams) -> BTreeMap<String, FootballAverages> {
    teams
        .par_iter()
        .filter_map(|(name, games)| Some((name.clone(), football_averages(sport, games)?)))
        .collect()
}

/// Per-game passing estimates. Attempts are inferred from yards and completion rate.
struct PassingEstimate {
    ypa: f64,
    attempts: f64,
}

fn estimate_passing(passing_yards: f64, completion_rate: f64) -> PassingEstimate {
    if completion_rate <= 0.0 {
        return PassingEstimate {
            ypa: 0.0,
            attempts: 0.0,
        };
    }
    let attempts = passing_yards / (completion_rate * YARDS_PER_COMPLETION);
    PassingEstimate {
        ypa: if attempts > 0.0 {
            passing_yards / attempts
        } else {
            0.0
        },
        attempts,
    }
}

fn explosive_pass(completion_rate: f64, ypa: f64) -> f64 {
    if completion_rate > 0.0 && ypa > 0.0 {
        (ypa / 12.0).min(0.3)
    } else {
        0.0
    }
}

fn explosive_run(rush_avg: f64) -> f64 {
    if rush_avg > 4.5 {
        (rush_avg / 8.0).min(0.25)
    } else {
        0.05
    }
}

fn football_summary(sport: Sport, games: &[&FootballGame]) -> Option<FootballAverages> {
    if games.is_empty() {
        return None;
    }
    let profile = sport.profile();
    let wavg = |f: &dyn Fn(&FootballGame) -> f64| {
        let values: Vec<f64> = games.iter().map(|g| f(*g)).collect();
        weighted_average(&values, profile.recency_base)
    };
    let wavg_vec = |values: &[f64]| weighted_average(values, profile.recency_base);

    let mut qb_rating = Vec::with_capacity(games.len());
    let mut qb_ypa = Vec::with_capacity(games.len());
    let mut qb_tds = Vec::new();
    let mut qb_ints = Vec::new();
    let mut td_int = Vec::with_capacity(games.len());
    let mut sack_rate = Vec::with_capacity(games.len());
    let mut epa = Vec::with_capacity(games.len());
    let mut explosive_pass_rate = Vec::with_capacity(games.len());
    let mut explosive_run_rate = Vec::with_capacity(games.len());
    let mut explosive_pass_allowed = Vec::with_capacity(games.len());
    let mut explosive_run_allowed = Vec::with_capacity(games.len());

    for g in games {
        let off = &g.stats.off;
        let def = &g.stats.def;
        let pts = g.score_for as f64;
        let passing = estimate_passing(off.passing_yards, off.completion_rate);

        match &g.stats.qb {
            Some(qb) => {
                qb_rating.push(qb.rating);
                qb_ypa.push(qb.ypa);
                qb_tds.push(qb.tds);
                qb_ints.push(qb.ints);
                td_int.push(qb.tds / (qb.ints + 0.5));
            }
            None => {
                qb_rating.push(DEFAULT_QB_RATING);
                qb_ypa.push(passing.ypa);
                let est_tds = pts / 7.0 * off.red_zone_rate;
                td_int.push(est_tds / (off.interceptions + 0.5));
            }
        }

        let dropbacks = passing.attempts + def.sacks;
        sack_rate.push(if dropbacks > 0.0 {
            def.sacks / dropbacks
        } else {
            0.0
        });

        let plays = if off.yards_per_play > 0.0 {
            off.total_yards / off.yards_per_play
        } else {
            60.0
        };
        epa.push(if plays > 0.0 {
            (pts - LEAGUE_AVG_POINTS) / plays
        } else {
            0.0
        });

        explosive_pass_rate.push(explosive_pass(off.completion_rate, passing.ypa));
        explosive_run_rate.push(explosive_run(off.rushing_avg));

        let allowed = estimate_passing(def.passing_yards, def.completion_rate);
        explosive_pass_allowed.push(if def.completion_rate > 0.0 {
            (allowed.ypa / 12.0).min(0.3)
        } else {
            0.0
        });
        explosive_run_allowed.push(explosive_run(def.rushing_avg));
    }

    let offense = FootballOffense {
        yards_per_play: wavg(&|g| g.stats.off.yards_per_play),
        total_yards: wavg(&|g| g.stats.off.total_yards),
        points_scored: wavg(&|g| g.score_for as f64),
        third_down_rate: wavg(&|g| g.stats.off.third_down_rate),
        fourth_down_rate: wavg(&|g| g.stats.off.fourth_down_rate),
        red_zone_rate: wavg(&|g| g.stats.off.red_zone_rate),
        turnovers: wavg(&|g| g.stats.off.turnovers),
        interceptions_thrown: wavg(&|g| g.stats.off.interceptions),
        fumbles_lost: wavg(&|g| g.stats.off.fumbles),
        rushing_yards: wavg(&|g| g.stats.off.rushing_yards),
        rushing_avg: wavg(&|g| g.stats.off.rushing_avg),
        passing_yards: wavg(&|g| g.stats.off.passing_yards),
        completion_rate: wavg(&|g| g.stats.off.completion_rate),
        yards_per_attempt: wavg_vec(&qb_ypa),
        td_int_ratio: wavg_vec(&td_int),
        sack_rate: wavg_vec(&sack_rate),
        sacks_made: wavg(&|g| g.stats.off.sacks),
        penalties: wavg(&|g| g.stats.off.penalties),
        epa_proxy: wavg_vec(&epa),
        explosive_pass_rate: wavg_vec(&explosive_pass_rate),
        explosive_run_rate: wavg_vec(&explosive_run_rate),
        qb_rating: wavg_vec(&qb_rating),
        qb_tds_per_game: wavg_vec(&qb_tds),
        qb_ints_per_game: wavg_vec(&qb_ints),
    };

    let defense = FootballDefense {
        yards_allowed: wavg(&|g| g.stats.def.total_yards),
        yards_per_play_allowed: wavg(&|g| g.stats.def.yards_per_play),
        points_allowed: wavg(&|g| g.score_against as f64),
        sacks_allowed: wavg(&|g| g.stats.def.sacks),
        rushing_yards_allowed: wavg(&|g| g.stats.def.rushing_yards),
        rushing_avg_allowed: wavg(&|g| g.stats.def.rushing_avg),
        passing_yards_allowed: wavg(&|g| g.stats.def.passing_yards),
        completion_allowed: wavg(&|g| g.stats.def.completion_rate),
        red_zone_allowed: wavg(&|g| g.stats.def.red_zone_rate),
        third_down_allowed: wavg(&|g| g.stats.def.third_down_rate),
        interceptions_forced: wavg(&|g| g.stats.def.interceptions),
        explosive_pass_allowed: wavg_vec(&explosive_pass_allowed),
        explosive_run_allowed: wavg_vec(&explosive_run_allowed),
    };

    let turnover_margin = match sport {
        Sport::Cfb => offense.sacks_made - offense.turnovers,
        _ => defense.interceptions_forced - offense.turnovers,
    };

    let (wins, win_rate) = record(games.iter().map(|g| g.won()));
    let scored: f64 = games.iter().map(|g| g.score_for as f64).sum();
    let allowed: f64 = games.iter().map(|g| g.score_against as f64).sum();

    let close: Vec<&&FootballGame> = games
        .iter()
        .filter(|g| g.point_diff() <= CLOSE_GAME_MARGIN)
        .collect();
    let close_wins = close.iter().filter(|g| g.won()).count();

    Some(FootballAverages {
        games_played: games.len(),
        wins,
        win_rate,
        pythagorean_win_rate: pythagorean(scored, allowed, profile.pyth_exponent),
        offense,
        defense,
        recent_form: recent_form(games, profile.recent_window, |g| {
            (g.won(), g.score_for, g.score_against)
        }),
        close_games: CloseGames {
            total: close.len(),
            wins: close_wins,
            win_rate: if close.is_empty() {
                0.5
            } else {
                close_wins as f64 / close.len() as f64
            },
        },
        splits: splits(games.iter().map(|g| (g.location, g.won()))),
        turnover_margin,
    })
}

pub fn baseball_averages(games: &[BaseballGame]) -> Option<BaseballAverages> {
    if games.is_empty() {
        return None;
    }
    let profile = Sport::Mlb.profile();
    let wavg = |f: &dyn Fn(&BaseballGame) -> f64| {
        let values: Vec<f64> = games.iter().map(f).collect();
        weighted_average(&values, profile.recency_base)
    };

    let runs_scored = wavg(&|g| g.score_for as f64);
    let runs_allowed = wavg(&|g| g.score_against as f64);
    let obp = wavg(&|g| g.stats.batting.obp);
    let slg = wavg(&|g| g.stats.batting.slg);

    let (wins, win_rate) = record(games.iter().map(|g| g.won()));
    let scored: f64 = games.iter().map(|g| g.score_for as f64).sum();
    let allowed: f64 = games.iter().map(|g| g.score_against as f64).sum();
    let refs: Vec<&BaseballGame> = games.iter().collect();

    Some(BaseballAverages {
        games_played: games.len(),
        wins,
        win_rate,
        pythagorean_win_rate: pythagorean(scored, allowed, profile.pyth_exponent),
        batting: BaseballBatting {
            runs_per_game: runs_scored,
            avg: wavg(&|g| g.stats.batting.avg),
            obp,
            slg,
            ops: obp + slg,
            hr_per_game: wavg(&|g| g.stats.batting.home_runs),
            hits_per_game: wavg(&|g| g.stats.batting.hits),
        },
        pitching: BaseballPitching {
            runs_allowed_per_game: runs_allowed,
            hits_allowed_per_game: wavg(&|g| g.stats.opponent.hits),
            errors_per_game: wavg(&|g| g.stats.batting.errors),
        },
        recent_form: recent_form(&refs, profile.recent_window, |g| {
            (g.won(), g.score_for, g.score_against)
        }),
        splits: splits(games.iter().map(|g| (g.location, g.won()))),
        run_differential: runs_scored - runs_allowed,
    })
}

pub fn baseball_team(teams: &BaseballTeams, team: &str) -> Option<BaseballAverages> {
    baseball_averages(teams.get(team)?)
}

fn record(results: impl Iterator<Item = bool>) -> (usize, f64) {
    let (mut wins, mut played) = (0usize, 0usize);
    for won in results {
        played += 1;
        if won {
            wins += 1;
        }
    }
    let rate = if played == 0 {
        0.0
    } else {
        wins as f64 / played as f64
    };
    (wins, rate)
}

fn recent_form<G>(games: &[&G], window: usize, line: impl Fn(&G) -> (bool, u32, u32)) -> RecentForm {
    let recent = &games[games.len().saturating_sub(window)..];
    if recent.is_empty() {
        return RecentForm::default();
    }
    let n = recent.len() as f64;
    let mut out = RecentForm {
        games: recent.len(),
        ..RecentForm::default()
    };
    for g in recent {
        let (won, scored, allowed) = line(*g);
        if won {
            out.wins += 1;
        }
        out.points_scored += scored as f64 / n;
        out.points_allowed += allowed as f64 / n;
    }
    out.win_rate = out.wins as f64 / n;
    out
}

fn splits(games: impl Iterator<Item = (Location, bool)>) -> Splits {
    let (mut home, mut home_wins, mut away, mut away_wins) = (0usize, 0usize, 0usize, 0usize);
    for (location, won) in games {
        match location {
            Location::Home => {
                home += 1;
                home_wins += won as usize;
            }
            Location::Away => {
                away += 1;
                away_wins += won as usize;
            }
        }
    }
    let rate = |w: usize, n: usize| if n == 0 { 0.5 } else { w as f64 / n as f64 };
    let home_win_rate = rate(home_wins, home);
    let away_win_rate = rate(away_wins, away);
    Splits {
        home_win_rate,
        away_win_rate,
        home_advantage: home_win_rate - away_win_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_average_of_constant_is_constant() {
        for n in 1..12 {
            let values = vec![7.25; n];
            assert!((weighted_average(&values, 1.5) - 7.25).abs() < 1e-9);
            assert!((weighted_average(&values, 2.0) - 7.25).abs() < 1e-9);
        }
    }

    #[test]
    fn weighted_average_favours_recent_games() {
        let values = [0.0, 0.0, 10.0, 10.0, 10.0];
        assert!(weighted_average(&values, 1.5) > 6.0);
        assert_eq!(weighted_average(&[], 1.5), 0.0);
        assert!((weighted_average(&[1.0, 2.0, 3.0], 1.5) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn pythagorean_handles_shutouts_and_empty_totals() {
        assert_eq!(pythagorean(0.0, 0.0, 2.37), 0.5);
        assert_eq!(pythagorean(10.0, 0.0, 2.37), 1.0);
        assert_eq!(pythagorean(0.0, 10.0, 1.83), 0.0);
        let p = pythagorean(300.0, 250.0, 2.37);
        assert!(p > 0.5 && p < 1.0);
    }
}
