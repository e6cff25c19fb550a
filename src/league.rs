//! League context for football scoring: schedule strength, style matchups and bounce-back signals.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::Serialize;

use crate::aggregate::{
    FootballAverages, football_averages_excluding_postseason, league_football, season_games,
};
use crate::model::{FootballGame, FootballTeams};
use crate::sport::Sport;

const RUN_HEAVY_SHARE: f64 = 0.55;
const PASS_HEAVY_SHARE: f64 = 0.45;
const BOUNCE_BACK_THRESHOLD: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OffensiveStyle {
    RunHeavy,
    PassHeavy,
    Balanced,
}

impl OffensiveStyle {
    pub fn label(self) -> &'static str {
        match self {
            OffensiveStyle::RunHeavy => "run_heavy",
            OffensiveStyle::PassHeavy => "pass_heavy",
            OffensiveStyle::Balanced => "balanced",
        }
    }
}

/// How a defense fared against offenses of one style.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarDefense {
    pub games: usize,
    pub avg_points_allowed: f64,
    pub avg_yards_allowed: f64,
    pub avg_ypp_allowed: f64,
    pub win_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleStrength {
    pub adjustment_factor: f64,
    /// 0 = faced the best defenses, 1 = the worst.
    pub avg_opp_def_rank: f64,
    pub faced_tough_defenses: bool,
    pub faced_weak_defenses: bool,
}

impl Default for ScheduleStrength {
    fn default() -> Self {
        Self {
            adjustment_factor: 1.0,
            avg_opp_def_rank: 0.5,
            faced_tough_defenses: false,
            faced_weak_defenses: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BounceBack {
    pub score: f64,
    pub factors: Vec<String>,
    pub potential: bool,
}

pub fn classify_offensive_style(avg: &FootballAverages) -> OffensiveStyle {
    let rush = avg.offense.rushing_yards;
    let total = rush + avg.offense.passing_yards;
    if total <= 0.0 {
        return OffensiveStyle::Balanced;
    }
    let share = rush / total;
    if share > RUN_HEAVY_SHARE {
        OffensiveStyle::RunHeavy
    } else if share < PASS_HEAVY_SHARE {
        OffensiveStyle::PassHeavy
    } else {
        OffensiveStyle::Balanced
    }
}

/// Team profiles for a whole league, computed once per prediction run.
pub struct League<'a> {
    pub sport: Sport,
    pub teams: &'a FootballTeams,
    pub averages: BTreeMap<String, FootballAverages>,
    /// Profiles used to judge opponents. College bowl games are left out of them.
    context: BTreeMap<String, FootballAverages>,
    defense_ranks: BTreeMap<String, f64>,
}

impl<'a> League<'a> {
    pub fn new(sport: Sport, teams: &'a FootballTeams) -> Self {
        let averages = league_football(sport, teams);
        let context = match sport {
            Sport::Cfb => teams
                .par_iter()
                .filter_map(|(name, games)| {
                    Some((name.clone(), football_averages_excluding_postseason(sport, games)?))
                })
                .collect(),
            _ => averages.clone(),
        };

        let mut by_ypp: Vec<(&String, f64)> = context
            .iter()
            .map(|(name, avg)| (name, avg.defense.yards_per_play_allowed))
            .collect();
        by_ypp.sort_by(|a, b| a.1.total_cmp(&b.1));
        let n = by_ypp.len() as f64;
        let defense_ranks = by_ypp
            .iter()
            .enumerate()
            .map(|(i, (name, _))| ((*name).clone(), (i + 1) as f64 / n))
            .collect();

        Self {
            sport,
            teams,
            averages,
            context,
            defense_ranks,
        }
    }

    pub fn averages(&self, team: &str) -> Option<&FootballAverages> {
        self.averages.get(team)
    }

    pub fn contains(&self, team: &str) -> bool {
        self.averages.contains_key(team)
    }

    pub fn team_names(&self) -> Vec<String> {
        self.averages.keys().cloned().collect()
    }

    /// Counted games for `team`, oldest first.
    pub fn games(&self, team: &str) -> Vec<&'a FootballGame> {
        self.teams
            .get(team)
            .map(|games| season_games(self.sport, games, false))
            .unwrap_or_default()
    }

    /// Mean win rate of the opponents a team has played; 0.5 with no data.
    pub fn opponent_quality(&self, team: &str) -> f64 {
        let rates: Vec<f64> = self
            .games(team)
            .iter()
            .filter_map(|g| self.context.get(&g.opponent).map(|a| a.win_rate))
            .collect();
        if rates.is_empty() {
            return 0.5;
        }
        rates.iter().sum::<f64>() / rates.len() as f64
    }

    /// How this team's defense did against offenses of `style`.
    pub fn similar_defense(&self, team: &str, style: OffensiveStyle) -> Option<SimilarDefense> {
        let similar: Vec<&FootballGame> = self
            .games(team)
            .into_iter()
            .filter(|g| {
                self.averages
                    .get(&g.opponent)
                    .is_some_and(|opp| classify_offensive_style(opp) == style)
            })
            .collect();
        if similar.is_empty() {
            return None;
        }
        let n = similar.len() as f64;
        Some(SimilarDefense {
            games: similar.len(),
            avg_points_allowed: similar.iter().map(|g| g.score_against as f64).sum::<f64>() / n,
            avg_yards_allowed: similar.iter().map(|g| g.stats.def.total_yards).sum::<f64>() / n,
            avg_ypp_allowed: similar.iter().map(|g| g.stats.def.yards_per_play).sum::<f64>() / n,
            win_rate: similar.iter().filter(|g| g.won()).count() as f64 / n,
        })
    }

    /// Schedule strength from the ypp-allowed rank of every defense faced.
    pub fn schedule_strength(&self, team: &str) -> ScheduleStrength {
        let ranks: Vec<f64> = self
            .games(team)
            .iter()
            .filter_map(|g| self.defense_ranks.get(&g.opponent).copied())
            .collect();
        if ranks.is_empty() {
            return ScheduleStrength::default();
        }
        let avg = ranks.iter().sum::<f64>() / ranks.len() as f64;
        ScheduleStrength {
            adjustment_factor: 1.0 + (0.5 - avg) * 0.3,
            avg_opp_def_rank: avg,
            faced_tough_defenses: avg < 0.4,
            faced_weak_defenses: avg > 0.6,
        }
    }

    pub fn bounce_back(&self, team: &str) -> BounceBack {
        bounce_back(&self.games(team))
    }
}

/// Signs that recent losses were bad luck rather than bad play. Needs two losses in the last
/// three games.
pub fn bounce_back(games: &[&FootballGame]) -> BounceBack {
    let mut out = BounceBack::default();
    if games.len() < 2 {
        return out;
    }
    let recent = &games[games.len().saturating_sub(3)..];
    let losses: Vec<&&FootballGame> = recent.iter().filter(|g| !g.won()).collect();
    if losses.len() < 2 {
        return out;
    }

    let margin = |g: &FootballGame| g.stats.off.sacks - g.stats.off.turnovers;

    if let Some(last) = games.last().filter(|g| !g.won()) {
        if margin(last) <= -2.0 {
            out.score += 1.5;
            out.factors.push("Bad turnover luck in last game".to_string());
        }
    }

    let last_two: f64 = games[games.len() - 2..].iter().map(|g| margin(g)).sum();
    if last_two <= -3.0 {
        out.score += 1.0;
        out.factors.push("Poor turnover margin last 2 games".to_string());
    }

    if recent.len() >= 2 {
        let third_down =
            recent.iter().map(|g| g.stats.off.third_down_rate).sum::<f64>() / recent.len() as f64;
        if third_down > 0.0 && third_down <= 0.25 {
            out.score += 1.0;
            out.factors
                .push("Extreme 3rd down struggles (likely to improve)".to_string());
        }
    }

    for loss in &losses {
        if loss.stats.off.total_yards > loss.stats.def.total_yards + 50.0 {
            out.score += 1.5;
            out.factors.push("Outgained opponent(s) but lost".to_string());
            break;
        }
        if loss.stats.off.yards_per_play > loss.stats.def.yards_per_play + 0.5 {
            out.score += 1.0;
            out.factors.push("Better efficiency metrics in loss".to_string());
            break;
        }
    }

    if losses
        .iter()
        .any(|g| g.score_against as i64 - g.score_for as i64 >= 20)
    {
        out.score += 0.5;
        out.factors.push("Blowout loss (less predictive)".to_string());
    }

    out.potential = out.score >= BOUNCE_BACK_THRESHOLD;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FootballBox, FootballSides, GameRecord, GameResult, Location, SeasonPhase};

    fn game(won: bool, pf: u32, pa: u32, off: FootballBox, def: FootballBox) -> FootballGame {
        GameRecord {
            opponent: "X".to_string(),
            location: Location::Home,
            result: if won { GameResult::Win } else { GameResult::Loss },
            score_for: pf,
            score_against: pa,
            phase: SeasonPhase::Regular,
            week: None,
            stats: FootballSides {
                off,
                def,
                qb: None,
            },
        }
    }

    #[test]
    fn outgained_losses_signal_bounce_back() {
        let off = FootballBox {
            total_yards: 420.0,
            third_down_rate: 0.2,
            turnovers: 3.0,
            ..FootballBox::default()
        };
        let def = FootballBox {
            total_yards: 300.0,
            ..FootballBox::default()
        };
        let games = vec![
            game(true, 20, 10, off.clone(), def.clone()),
            game(false, 10, 17, off.clone(), def.clone()),
            game(false, 13, 20, off, def),
        ];
        let refs: Vec<&FootballGame> = games.iter().collect();
        let bb = bounce_back(&refs);
        // turnover luck 1.5, two-game margin 1.0, third downs 1.0, outgained 1.5
        assert!((bb.score - 5.0).abs() < 1e-9);
        assert!(bb.potential);
    }

    #[test]
    fn a_single_loss_is_not_a_slump() {
        let games = vec![
            game(true, 20, 10, FootballBox::default(), FootballBox::default()),
            game(false, 10, 40, FootballBox::default(), FootballBox::default()),
        ];
        let refs: Vec<&FootballGame> = games.iter().collect();
        assert_eq!(bounce_back(&refs), BounceBack::default());
    }

    #[test]
    fn style_thresholds() {
        let mut avg = FootballAverages::default();
        avg.offense.rushing_yards = 160.0;
        avg.offense.passing_yards = 100.0;
        assert_eq!(classify_offensive_style(&avg), OffensiveStyle::RunHeavy);
        avg.offense.rushing_yards = 80.0;
        assert_eq!(classify_offensive_style(&avg), OffensiveStyle::PassHeavy);
        avg.offense.passing_yards = 80.0;
        assert_eq!(classify_offensive_style(&avg), OffensiveStyle::Balanced);
    }
}
