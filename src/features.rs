//! Matchup features for the NFL classifier. Mostly differences and ratios between the two
//! profiles, which carry more signal than either team's raw numbers.

use crate::aggregate::FootballAverages;
use crate::injuries::InjuryImpact;
use crate::model::FootballGame;

pub const FEATURE_COUNT: usize = 76;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "off_epa_diff",
    "off_epa_diff_weighted",
    "def_epa_diff",
    "home_off_vs_away_def_ypp",
    "away_off_vs_home_def_ypp",
    "explosive_pass_diff",
    "explosive_run_diff",
    "home_explosive_pass_vs_away_d",
    "away_explosive_pass_vs_home_d",
    "home_explosive_run_vs_away_d",
    "away_explosive_run_vs_home_d",
    "home_rush_vs_away_rush_d",
    "away_rush_vs_home_rush_d",
    "home_rush_eff_vs_away_rush_d_eff",
    "away_rush_eff_vs_home_rush_d_eff",
    "home_pass_vs_away_pass_d",
    "away_pass_vs_home_pass_d",
    "home_comp_vs_away_comp_d",
    "away_comp_vs_home_comp_d",
    "qb_ypa_diff",
    "qb_td_int_ratio_diff",
    "qb_sack_rate_diff",
    "qb_completion_diff",
    "qb_composite_diff",
    "home_rz_vs_away_rz_d",
    "away_rz_vs_home_rz_d",
    "home_pts_vs_away_pts_d",
    "away_pts_vs_home_pts_d",
    "red_zone_diff",
    "red_zone_diff_weighted",
    "third_down_diff",
    "home_3rd_vs_away_3rd_d",
    "away_3rd_vs_home_3rd_d",
    "pass_defense_diff",
    "win_rate_diff",
    "recent_form_diff",
    "points_scored_diff",
    "points_allowed_diff",
    "ypp_diff",
    "turnover_margin_diff",
    "turnover_margin_diff_weighted",
    "int_thrown_diff",
    "int_forced_diff",
    "recent_turnover_margin_diff",
    "sack_diff",
    "penalty_diff",
    "home_field_advantage",
    "home_at_home_winrate",
    "away_on_road_winrate",
    "location_matchup",
    "close_game_diff",
    "home_pyth_diff",
    "away_pyth_diff",
    "pyth_luck_diff",
    "qb_rating_diff",
    "home_qb_rating",
    "away_qb_rating",
    "qb_defense_matchup",
    "points_per_drive_diff",
    "home_consistency",
    "away_consistency",
    "consistency_diff",
    "third_down_matchup",
    "away_third_down_matchup",
    "fourth_down_diff",
    "avg_win_margin_diff",
    "blowout_rate_diff",
    "recent_form_diff_weighted",
    "home_recent_pts_scored",
    "away_recent_pts_scored",
    "home_recent_pts_allowed",
    "away_recent_pts_allowed",
    "recent_scoring_diff",
    "injury_impact_diff",
    "home_qb_injured",
    "away_qb_injured",
];

const OFFENSE_WEIGHT: f64 = 1.6;
const RECENT_FORM_WEIGHT: f64 = 1.25;
const BLOWOUT_MARGIN: u32 = 14;
const MIN_DRIVES: f64 = 8.0;

/// One side of a matchup as the feature builder sees it.
#[derive(Debug, Clone, Copy)]
pub struct TeamSnapshot<'a> {
    pub avg: &'a FootballAverages,
    /// Counted games, oldest first.
    pub games: &'a [&'a FootballGame],
    pub injury: Option<&'a InjuryImpact>,
}

/// Values in `FEATURE_NAMES` order.
pub fn matchup_features(home: &TeamSnapshot, away: &TeamSnapshot) -> [f64; FEATURE_COUNT] {
    let (h, a) = (home.avg, away.avg);
    let (ho, ao) = (&h.offense, &a.offense);
    let (hd, ad) = (&h.defense, &a.defense);

    let home_pyth = h.win_rate - h.pythagorean_win_rate;
    let away_pyth = a.win_rate - a.pythagorean_win_rate;
    let home_consistency = consistency(home.games);
    let away_consistency = consistency(away.games);
    let recent_form = h.recent_form.win_rate - a.recent_form.win_rate;

    let recent_turnovers = if home.games.is_empty() || away.games.is_empty() {
        0.0
    } else {
        recent_turnover_margin(home.games) - recent_turnover_margin(away.games)
    };
    let close_game_diff = if h.close_games.total >= 2 && a.close_games.total >= 2 {
        h.close_games.win_rate - a.close_games.win_rate
    } else {
        0.0
    };
    let (injury_diff, home_qb_out, away_qb_out) = match (home.injury, away.injury) {
        (Some(hi), Some(ai)) => (
            ai.impact_score - hi.impact_score,
            flag(hi.qb_injured),
            flag(ai.qb_injured),
        ),
        _ => (0.0, 0.0, 0.0),
    };

    [
        ho.epa_proxy - ao.epa_proxy,
        (ho.epa_proxy - ao.epa_proxy) * OFFENSE_WEIGHT,
        ad.yards_per_play_allowed - hd.yards_per_play_allowed,
        ratio(ho.yards_per_play, ad.yards_per_play_allowed),
        ratio(ao.yards_per_play, hd.yards_per_play_allowed),
        ho.explosive_pass_rate - ao.explosive_pass_rate,
        ho.explosive_run_rate - ao.explosive_run_rate,
        ho.explosive_pass_rate - ad.explosive_pass_allowed,
        ao.explosive_pass_rate - hd.explosive_pass_allowed,
        ho.explosive_run_rate - ad.explosive_run_allowed,
        ao.explosive_run_rate - hd.explosive_run_allowed,
        ratio(ho.rushing_yards, ad.rushing_yards_allowed),
        ratio(ao.rushing_yards, hd.rushing_yards_allowed),
        ratio(ho.rushing_avg, ad.rushing_avg_allowed),
        ratio(ao.rushing_avg, hd.rushing_avg_allowed),
        ratio(ho.passing_yards, ad.passing_yards_allowed),
        ratio(ao.passing_yards, hd.passing_yards_allowed),
        ho.completion_rate - ad.completion_allowed,
        ao.completion_rate - hd.completion_allowed,
        ho.yards_per_attempt - ao.yards_per_attempt,
        ho.td_int_ratio - ao.td_int_ratio,
        ao.sack_rate - ho.sack_rate,
        ho.completion_rate - ao.completion_rate,
        qb_composite(h) - qb_composite(a),
        ho.red_zone_rate - ad.red_zone_allowed,
        ao.red_zone_rate - hd.red_zone_allowed,
        ratio(ho.points_scored, ad.points_allowed),
        ratio(ao.points_scored, hd.points_allowed),
        ho.red_zone_rate - ao.red_zone_rate,
        (ho.red_zone_rate - ao.red_zone_rate) * 2.0,
        ho.third_down_rate - ao.third_down_rate,
        ho.third_down_rate - ad.third_down_allowed,
        ao.third_down_rate - hd.third_down_allowed,
        pass_defense_quality(h) - pass_defense_quality(a),
        h.win_rate - a.win_rate,
        recent_form,
        ho.points_scored - ao.points_scored,
        ad.points_allowed - hd.points_allowed,
        ho.yards_per_play - ao.yards_per_play,
        h.turnover_margin - a.turnover_margin,
        (h.turnover_margin - a.turnover_margin) * 2.0,
        ao.interceptions_thrown - ho.interceptions_thrown,
        hd.interceptions_forced - ad.interceptions_forced,
        recent_turnovers,
        (ho.sacks_made - hd.sacks_allowed) - (ao.sacks_made - ad.sacks_allowed),
        ao.penalties - ho.penalties,
        h.splits.home_advantage,
        h.splits.home_win_rate,
        a.splits.away_win_rate,
        h.splits.home_win_rate - a.splits.away_win_rate,
        close_game_diff,
        home_pyth,
        away_pyth,
        home_pyth - away_pyth,
        ho.qb_rating - ao.qb_rating,
        ho.qb_rating,
        ao.qb_rating,
        ao.qb_rating - ho.qb_rating,
        points_per_drive(h) - points_per_drive(a),
        home_consistency,
        away_consistency,
        home_consistency - away_consistency,
        ho.third_down_rate - ad.third_down_allowed,
        ao.third_down_rate - hd.third_down_allowed,
        ho.fourth_down_rate - ao.fourth_down_rate,
        avg_win_margin(home.games) - avg_win_margin(away.games),
        blowout_rate(home.games) - blowout_rate(away.games),
        recent_form * RECENT_FORM_WEIGHT,
        h.recent_form.points_scored,
        a.recent_form.points_scored,
        h.recent_form.points_allowed,
        a.recent_form.points_allowed,
        (h.recent_form.points_scored - h.recent_form.points_allowed)
            - (a.recent_form.points_scored - a.recent_form.points_allowed),
        injury_diff,
        home_qb_out,
        away_qb_out,
    ]
}

pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_NAMES.iter().position(|n| *n == name)
}

fn ratio(offense: f64, allowed: f64) -> f64 {
    offense / (allowed + 0.1)
}

fn flag(b: bool) -> f64 {
    if b { 1.0 } else { 0.0 }
}

fn qb_composite(avg: &FootballAverages) -> f64 {
    let o = &avg.offense;
    o.yards_per_attempt * 0.3 + o.completion_rate * 0.3 + o.td_int_ratio * 0.2 - o.sack_rate * 0.2
}

fn pass_defense_quality(avg: &FootballAverages) -> f64 {
    (1.0 - avg.defense.completion_allowed) + (6.0 - avg.defense.yards_per_play_allowed)
}

/// Points per estimated drive, with at least eight drives a game.
fn points_per_drive(avg: &FootballAverages) -> f64 {
    let o = &avg.offense;
    let drives = if o.yards_per_play > 0.0 {
        o.total_yards / (o.yards_per_play * 12.0)
    } else {
        0.0
    };
    o.points_scored / drives.max(MIN_DRIVES)
}

/// Mean of (sacks - turnovers) over the last three games.
fn recent_turnover_margin(games: &[&FootballGame]) -> f64 {
    let recent = &games[games.len().saturating_sub(3)..];
    if recent.is_empty() {
        return 0.0;
    }
    recent
        .iter()
        .map(|g| g.stats.off.sacks - g.stats.off.turnovers)
        .sum::<f64>()
        / recent.len() as f64
}

/// `1 / (stdev + 5)` of points scored over the last five games.
fn consistency(games: &[&FootballGame]) -> f64 {
    let recent: Vec<f64> = games[games.len().saturating_sub(5)..]
        .iter()
        .map(|g| g.score_for as f64)
        .collect();
    1.0 / (sample_std(&recent) + 5.0)
}

pub(crate) fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    var.sqrt()
}

fn avg_win_margin(games: &[&FootballGame]) -> f64 {
    let margins: Vec<f64> = games
        .iter()
        .filter(|g| g.won())
        .map(|g| g.point_diff() as f64)
        .collect();
    if margins.is_empty() {
        return 0.0;
    }
    margins.iter().sum::<f64>() / margins.len() as f64
}

fn blowout_rate(games: &[&FootballGame]) -> f64 {
    let wins: Vec<&&FootballGame> = games.iter().filter(|g| g.won()).collect();
    let blowouts = wins.iter().filter(|g| g.point_diff() >= BLOWOUT_MARGIN).count();
    blowouts as f64 / wins.len().max(1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FootballSides, GameRecord, GameResult, Location, SeasonPhase};
    use std::collections::HashSet;

    fn game(pf: u32, pa: u32) -> FootballGame {
        GameRecord {
            opponent: "X".to_string(),
            location: Location::Home,
            result: if pf > pa { GameResult::Win } else { GameResult::Loss },
            score_for: pf,
            score_against: pa,
            phase: SeasonPhase::Regular,
            week: None,
            stats: FootballSides::default(),
        }
    }

    fn value(values: &[f64; FEATURE_COUNT], name: &str) -> f64 {
        values[feature_index(name).unwrap()]
    }

    #[test]
    fn feature_names_are_unique() {
        let unique: HashSet<&str> = FEATURE_NAMES.iter().copied().collect();
        assert_eq!(unique.len(), FEATURE_COUNT);
    }

    #[test]
    fn identical_teams_have_zero_differences() {
        let mut avg = FootballAverages::default();
        avg.win_rate = 0.6;
        avg.offense.yards_per_play = 5.5;
        avg.defense.yards_per_play_allowed = 5.0;
        let games = [game(24, 17), game(10, 20), game(31, 3)];
        let refs: Vec<&FootballGame> = games.iter().collect();
        let side = TeamSnapshot {
            avg: &avg,
            games: &refs,
            injury: None,
        };
        let values = matchup_features(&side, &side);
        for (name, v) in FEATURE_NAMES.iter().zip(values) {
            let per_team = name.starts_with("home_") || name.starts_with("away_");
            if !per_team && name.contains("_diff") {
                assert_eq!(v, 0.0, "{name}");
            }
        }
        assert!((value(&values, "home_off_vs_away_def_ypp") - 5.5 / 5.1).abs() < 1e-12);
    }

    #[test]
    fn win_margins_and_blowouts() {
        let games = [game(35, 7), game(20, 17), game(3, 30)];
        let refs: Vec<&FootballGame> = games.iter().collect();
        assert_eq!(avg_win_margin(&refs), 15.5);
        assert_eq!(blowout_rate(&refs), 0.5);
        assert_eq!(blowout_rate(&[]), 0.0);
    }

    #[test]
    fn consistency_of_a_single_game_uses_zero_spread() {
        let games = [game(21, 0)];
        let refs: Vec<&FootballGame> = games.iter().collect();
        assert_eq!(consistency(&refs), 0.2);
        assert!((sample_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]) - 2.138089935).abs() < 1e-6);
    }

    #[test]
    fn injuries_only_count_when_both_sides_are_known() {
        let avg = FootballAverages::default();
        let hurt = InjuryImpact {
            impact_score: 8.0,
            qb_injured: true,
            ..InjuryImpact::default()
        };
        let healthy = InjuryImpact::default();
        let home = TeamSnapshot {
            avg: &avg,
            games: &[],
            injury: Some(&hurt),
        };
        let away = TeamSnapshot {
            avg: &avg,
            games: &[],
            injury: Some(&healthy),
        };
        let values = matchup_features(&home, &away);
        assert_eq!(value(&values, "injury_impact_diff"), -8.0);
        assert_eq!(value(&values, "home_qb_injured"), 1.0);

        let unknown = TeamSnapshot { injury: None, ..away };
        let values = matchup_features(&home, &unknown);
        assert_eq!(value(&values, "injury_impact_diff"), 0.0);
        assert_eq!(value(&values, "home_qb_injured"), 0.0);
    }
}
