//! Heuristic MLB matchup scorer: starters, bullpens, park, weather and team form.

use std::fmt::Write as _;

use serde::Serialize;

use crate::aggregate::{BaseballAverages, baseball_averages};
use crate::error::PredictError;
use crate::injuries::{InjuryImpact, InjuryReport, team_impact};
use crate::model::BaseballTeams;
use crate::park_factors::{self, Park};
use crate::pitchers::{self, Bullpen, PitcherStats};
use crate::prediction::{Award, Ledger, Prediction, Side};
use crate::sport::Sport;
use crate::weather::WeatherSummary;

/// Inputs that don't come from the box scores.
#[derive(Debug, Clone, Default)]
pub struct GameContext {
    pub weather: Option<WeatherSummary>,
    pub home_pitcher: Option<PitcherStats>,
    pub away_pitcher: Option<PitcherStats>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BaseballPrediction {
    #[serde(flatten)]
    pub prediction: Prediction,
    pub home_stats: BaseballAverages,
    pub away_stats: BaseballAverages,
    pub home_bullpen: Bullpen,
    pub away_bullpen: Bullpen,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub park: Option<Park>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<WeatherSummary>,
}

struct Team<'a> {
    name: &'a str,
    avg: &'a BaseballAverages,
    bullpen: Bullpen,
    pitcher: Option<&'a PitcherStats>,
    injuries: Option<InjuryImpact>,
}

type Rule = fn(&Team, &Team) -> Option<Award>;

const PITCHING_RULES: &[Rule] = &[starting_pitchers, bullpens];

const TEAM_RULES: &[Rule] = &[offense_vs_prevention, run_production, power, momentum];

const RECORD_RULES: &[Rule] = &[
    win_rate_credit,
    pythagorean,
    run_differential,
    starter_injury,
    injury_burden,
];

/// Park and weather belong to the home ballpark, so they are dropped at a neutral site.
pub fn predict(
    teams: &BaseballTeams,
    home: &str,
    away: &str,
    neutral_site: bool,
    injuries: Option<&InjuryReport>,
    context: &GameContext,
) -> Result<BaseballPrediction, PredictError> {
    let missing: Vec<String> = [home, away]
        .into_iter()
        .filter(|t| !teams.contains_key(*t))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(PredictError::UnknownTeam(missing));
    }
    let (Some(home_games), Some(away_games)) = (teams.get(home), teams.get(away)) else {
        return Err(PredictError::UnknownTeam(vec![home.to_string(), away.to_string()]));
    };
    let (Some(home_avg), Some(away_avg)) =
        (baseball_averages(home_games), baseball_averages(away_games))
    else {
        return Err(PredictError::InvalidRequest(format!(
            "not enough games to predict {away} at {home}"
        )));
    };

    let home_team = Team {
        name: home,
        avg: &home_avg,
        bullpen: pitchers::bullpen(home_games),
        pitcher: context.home_pitcher.as_ref(),
        injuries: injuries.map(|r| team_impact(Sport::Mlb, r, home)),
    };
    let away_team = Team {
        name: away,
        avg: &away_avg,
        bullpen: pitchers::bullpen(away_games),
        pitcher: context.away_pitcher.as_ref(),
        injuries: injuries.map(|r| team_impact(Sport::Mlb, r, away)),
    };

    let park = (!neutral_site).then(|| park_factors::park_for(home));
    let weather = if neutral_site { None } else { context.weather.clone() };

    let mut ledger = Ledger::default();
    for rule in PITCHING_RULES {
        ledger.both(&home_team, &away_team, rule);
    }
    if let Some(park) = &park {
        environment(
            &mut ledger,
            park_factors::impact_score(home),
            &format!("{} park", park.name),
        );
    }
    if let Some(weather) = &weather {
        environment(&mut ledger, weather.impact, "weather");
    }
    for rule in TEAM_RULES {
        ledger.both(&home_team, &away_team, rule);
    }
    if !neutral_site {
        home_field(&mut ledger, &home_team);
    }
    for rule in RECORD_RULES {
        ledger.both(&home_team, &away_team, rule);
    }

    let (home_bullpen, away_bullpen) = (home_team.bullpen, away_team.bullpen);
    Ok(BaseballPrediction {
        prediction: Prediction::from_ledger(Sport::Mlb, home, away, neutral_site, ledger),
        home_stats: home_avg,
        away_stats: away_avg,
        home_bullpen,
        away_bullpen,
        park,
        weather,
    })
}

/// Hitter-friendly conditions help both lineups, the home one a little more; pitcher-friendly
/// conditions lean to the home staff.
fn environment(ledger: &mut Ledger, impact: f64, what: &str) {
    if impact > 0.0 {
        ledger.award(Side::Home, impact * 0.6, format!("hitter-friendly {what}"));
        ledger.award(Side::Away, impact * 0.4, format!("hitter-friendly {what}"));
    } else if impact < 0.0 {
        ledger.award(Side::Home, impact.abs() * 0.3, format!("pitcher-friendly {what}"));
    }
}

fn home_field(ledger: &mut Ledger, home: &Team) {
    let edge = home.avg.splits.home_advantage;
    let points = if edge > 0.20 {
        3.5
    } else if edge > 0.10 {
        2.5
    } else {
        2.0
    };
    ledger.award(Side::Home, points, format!("{} home field", home.name));
}

fn starting_pitchers(me: &Team, them: &Team) -> Option<Award> {
    let (mine, theirs) = (me.pitcher?, them.pitcher?);
    let diff = pitchers::quality_score(mine) - pitchers::quality_score(theirs);
    let points = if diff >= 30.0 {
        5.0
    } else if diff >= 20.0 {
        3.5
    } else if diff >= 10.0 {
        2.0
    } else if diff >= 5.0 {
        1.0
    } else {
        return None;
    };
    Award::own(points, format!("{} has the better starter", me.name))
}

fn bullpens(me: &Team, them: &Team) -> Option<Award> {
    let diff = me.bullpen.quality_score - them.bullpen.quality_score;
    if diff >= 20.0 {
        Award::own(2.0, format!("{} bullpen significantly better", me.name))
    } else if diff >= 10.0 {
        Award::own(1.0, format!("{} bullpen better", me.name))
    } else {
        None
    }
}

fn offense_vs_prevention(me: &Team, them: &Team) -> Option<Award> {
    let ratio = me.avg.batting.ops / (them.avg.pitching.runs_allowed_per_game / 4.5 + 0.1);
    if ratio > 1.15 {
        Award::own(3.0, format!("{} lineup overmatches {} pitching", me.name, them.name))
    } else if ratio > 1.05 {
        Award::own(1.5, format!("{} lineup has the edge", me.name))
    } else if ratio < 0.90 {
        Award::opponent(2.0, format!("{} pitching dominates {}", them.name, me.name))
    } else {
        None
    }
}

fn run_production(me: &Team, them: &Team) -> Option<Award> {
    if me.avg.batting.runs_per_game > them.avg.batting.runs_per_game + 1.0 {
        Award::own(2.0, format!("{} scores more runs", me.name))
    } else {
        None
    }
}

fn power(me: &Team, them: &Team) -> Option<Award> {
    if me.avg.batting.hr_per_game > them.avg.batting.hr_per_game + 0.5 {
        Award::own(1.0, format!("{} hits for more power", me.name))
    } else {
        None
    }
}

fn momentum(me: &Team, _: &Team) -> Option<Award> {
    let rate = me.avg.recent_form.win_rate;
    if rate >= 0.70 {
        Award::own(2.0, format!("{} hot over the last ten", me.name))
    } else if rate >= 0.60 {
        Award::own(1.0, format!("{} playing well lately", me.name))
    } else if rate <= 0.30 {
        Award::opponent(1.5, format!("{} cold lately", me.name))
    } else {
        None
    }
}

fn win_rate_credit(me: &Team, _: &Team) -> Option<Award> {
    Award::own(me.avg.win_rate * 3.0, format!("{} win rate", me.name))
}

fn pythagorean(me: &Team, _: &Team) -> Option<Award> {
    let luck = me.avg.win_rate - me.avg.pythagorean_win_rate;
    if luck > 0.10 {
        Award::own(-1.0, format!("{} due to regress", me.name))
    } else if luck < -0.10 {
        Award::own(1.0, format!("{} better than its record", me.name))
    } else {
        None
    }
}

fn run_differential(me: &Team, them: &Team) -> Option<Award> {
    if me.avg.run_differential > them.avg.run_differential + 1.0 {
        Award::own(1.5, format!("{} better run differential", me.name))
    } else {
        None
    }
}

fn starter_injury(me: &Team, them: &Team) -> Option<Award> {
    let (mine, theirs) = (me.injuries.as_ref()?, them.injuries.as_ref()?);
    if theirs.sp_injured && !mine.sp_injured {
        Award::own(4.0, format!("{} starting pitcher injured", them.name))
    } else {
        None
    }
}

fn injury_burden(me: &Team, them: &Team) -> Option<Award> {
    let (mine, theirs) = (me.injuries.as_ref()?, them.injuries.as_ref()?);
    if mine.sp_injured || theirs.sp_injured {
        return None;
    }
    if theirs.impact_score - mine.impact_score > 5.0 {
        Award::own(2.0, format!("{} more injured", them.name))
    } else {
        None
    }
}

pub fn render(result: &BaseballPrediction) -> String {
    let p = &result.prediction;
    let rule = "=".repeat(100);
    let mut out = String::new();
    let _ = writeln!(out, "{rule}\nTEAM ANALYSIS\n{rule}");
    for (name, avg, pen) in [
        (&p.home_team, &result.home_stats, &result.home_bullpen),
        (&p.away_team, &result.away_stats, &result.away_bullpen),
    ] {
        let _ = writeln!(out, "\n{name} {}-{}", avg.wins, avg.games_played - avg.wins);
        let _ = writeln!(
            out,
            "  Batting: {:.2} runs/game, {:.3} AVG, {:.3} OPS, {:.2} HR/game",
            avg.batting.runs_per_game, avg.batting.avg, avg.batting.ops, avg.batting.hr_per_game
        );
        let _ = writeln!(
            out,
            "  Pitching: {:.2} runs allowed/game | bullpen ERA ~{:.2} (score {:.0})",
            avg.pitching.runs_allowed_per_game, pen.era, pen.quality_score
        );
        let _ = writeln!(
            out,
            "  Last {}: {}-{} | run differential {:+.2}",
            avg.recent_form.games,
            avg.recent_form.wins,
            avg.recent_form.games - avg.recent_form.wins,
            avg.run_differential
        );
    }
    if let Some(park) = &result.park {
        let _ = writeln!(
            out,
            "\nPark: {} (run factor {}, altitude {} ft)",
            park.name, park.run_factor, park.altitude
        );
    }
    if let Some(weather) = &result.weather {
        match &weather.weather {
            Some(w) => {
                let _ = writeln!(
                    out,
                    "Weather: {}F, wind {} mph {}, {} (impact {:+.1}: {})",
                    w.temp_f,
                    w.wind_speed_mph,
                    w.wind_dir,
                    w.condition,
                    weather.impact,
                    weather.notes.join(", ")
                );
            }
            None => {
                let _ = writeln!(out, "Weather: unavailable");
            }
        }
    }
    let _ = writeln!(out, "\n{rule}\nMATCHUP FACTORS\n{rule}");
    for factor in &p.factors {
        let team = match factor.side {
            Side::Home => &p.home_team,
            Side::Away => &p.away_team,
        };
        let _ = writeln!(out, "  {:+.2} {team}: {}", factor.points, factor.reason);
    }
    let _ = writeln!(out, "\n{rule}\nFINAL PREDICTION\n{rule}");
    let _ = writeln!(out, "{}: {:.1} points", p.home_team, p.home_points);
    let _ = writeln!(out, "{}: {:.1} points", p.away_team, p.away_points);
    if p.is_tie() {
        let _ = writeln!(out, "PREDICTION: Too close to call\nConfidence: 50%");
    } else {
        let _ = writeln!(out, "PREDICTION: {} wins\nConfidence: {:.0}%", p.winner, p.confidence);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BaseballBox, BaseballSides, GameRecord, GameResult, Location, SeasonPhase};

    fn game(opp: &str, loc: Location, rf: u32, ra: u32, ops: (f64, f64)) -> GameRecord<BaseballSides> {
        GameRecord {
            opponent: opp.to_string(),
            location: loc,
            result: if rf > ra { GameResult::Win } else { GameResult::Loss },
            score_for: rf,
            score_against: ra,
            phase: SeasonPhase::Regular,
            week: None,
            stats: BaseballSides {
                batting: BaseballBox {
                    runs: rf as f64,
                    obp: ops.0,
                    slg: ops.1,
                    ..BaseballBox::default()
                },
                opponent: BaseballBox {
                    runs: ra as f64,
                    ..BaseballBox::default()
                },
            },
        }
    }

    fn teams() -> BaseballTeams {
        let mut teams = BaseballTeams::new();
        teams.insert(
            "Colorado Rockies".to_string(),
            (0..8)
                .map(|i| game("San Francisco Giants", if i % 2 == 0 { Location::Home } else { Location::Away }, 6, 3, (0.34, 0.45)))
                .collect(),
        );
        teams.insert(
            "San Francisco Giants".to_string(),
            (0..8)
                .map(|i| game("Colorado Rockies", if i % 2 == 0 { Location::Away } else { Location::Home }, 3, 6, (0.29, 0.36)))
                .collect(),
        );
        teams
    }

    #[test]
    fn neutral_site_is_symmetric() {
        let data = teams();
        let ctx = GameContext::default();
        let a = predict(&data, "Colorado Rockies", "San Francisco Giants", true, None, &ctx).unwrap();
        let b = predict(&data, "San Francisco Giants", "Colorado Rockies", true, None, &ctx).unwrap();
        assert_eq!(a.prediction.home_points, b.prediction.away_points);
        assert_eq!(a.prediction.away_points, b.prediction.home_points);
        assert!(a.park.is_none());
    }

    #[test]
    fn coors_boosts_both_lineups() {
        let data = teams();
        let ctx = GameContext::default();
        let p = predict(&data, "Colorado Rockies", "San Francisco Giants", false, None, &ctx).unwrap();
        let park: Vec<_> = p
            .prediction
            .factors
            .iter()
            .filter(|f| f.reason.contains("Coors Field"))
            .collect();
        assert_eq!(park.len(), 2);
        assert_eq!(p.prediction.winner, "Colorado Rockies");
        assert!(p.prediction.confidence <= 92.0);
    }

    #[test]
    fn ace_starter_adds_five() {
        let data = teams();
        let base = predict(&data, "San Francisco Giants", "Colorado Rockies", false, None, &GameContext::default())
            .unwrap()
            .prediction;
        let ctx = GameContext {
            home_pitcher: pitchers::sample_pitcher("Gerrit Cole"),
            away_pitcher: pitchers::sample_pitcher("Weak Pitcher"),
            ..GameContext::default()
        };
        let with_ace = predict(&data, "San Francisco Giants", "Colorado Rockies", false, None, &ctx)
            .unwrap()
            .prediction;
        assert!((with_ace.home_points - base.home_points - 5.0).abs() < 1e-9);
    }
}
