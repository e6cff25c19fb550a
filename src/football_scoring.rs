//! Heuristic NFL / college matchup scorer.
//!
//! Each rule looks at the game from one team's side and may credit that team or its opponent.
//! `Ledger::both` evaluates it for home and away alike; only home field is one-sided.

use std::fmt::Write as _;

use serde::Serialize;

use crate::aggregate::FootballAverages;
use crate::error::PredictError;
use crate::injuries::{InjuryImpact, InjuryReport, team_impact};
use crate::league::{
    BounceBack, League, OffensiveStyle, ScheduleStrength, SimilarDefense, classify_offensive_style,
};
use crate::prediction::{Award, Ledger, Prediction, Side};
use crate::sport::Sport;

#[derive(Debug, Clone, Serialize)]
pub struct FootballPrediction {
    #[serde(flatten)]
    pub prediction: Prediction,
    pub home_stats: FootballAverages,
    pub away_stats: FootballAverages,
}

/// Everything the rules know about one side of the matchup.
struct Team<'a> {
    sport: Sport,
    name: &'a str,
    avg: &'a FootballAverages,
    vs_opponent_style: Option<SimilarDefense>,
    opponent_style: OffensiveStyle,
    opponent_quality: f64,
    strength: ScheduleStrength,
    bounce_back: BounceBack,
    injuries: Option<InjuryImpact>,
}

type Rule = fn(&Team, &Team) -> Option<Award>;

const MATCHUP_RULES: &[Rule] = &[
    similar_opponents,
    ypp_matchup,
    rushing_matchup,
    passing_matchup,
    scoring_matchup,
    third_down_edge,
    pass_rush_edge,
    momentum,
    opponent_quality,
    schedule_strength,
    close_games,
];

const EFFICIENCY_RULES: &[Rule] = &[
    completion_matchup,
    finishing_drives,
    rushing_efficiency,
    interception_risk,
    penalty_discipline,
];

const RECORD_RULES: &[Rule] = &[
    win_rate_credit,
    bounce_back,
    pythagorean_luck,
    losing_record,
    turnover_margin,
    qb_injury,
    injury_burden,
];

pub fn predict(
    league: &League,
    home: &str,
    away: &str,
    neutral_site: bool,
    injuries: Option<&InjuryReport>,
) -> Result<FootballPrediction, PredictError> {
    let missing: Vec<String> = [home, away]
        .into_iter()
        .filter(|t| !league.teams.contains_key(*t))
        .map(str::to_string)
        .collect();
    if !missing.is_empty() {
        return Err(PredictError::UnknownTeam(missing));
    }
    let (Some(home_avg), Some(away_avg)) = (league.averages(home), league.averages(away)) else {
        return Err(PredictError::InvalidRequest(format!(
            "not enough season data to predict {away} at {home}"
        )));
    };

    let home_style = classify_offensive_style(home_avg);
    let away_style = classify_offensive_style(away_avg);
    let home_team = team(league, home, home_avg, away_style, injuries);
    let away_team = team(league, away, away_avg, home_style, injuries);
    let ledger = score(&home_team, &away_team, neutral_site);

    Ok(FootballPrediction {
        prediction: Prediction::from_ledger(league.sport, home, away, neutral_site, ledger),
        home_stats: home_avg.clone(),
        away_stats: away_avg.clone(),
    })
}

fn team<'a>(
    league: &League,
    name: &'a str,
    avg: &'a FootballAverages,
    opponent_style: OffensiveStyle,
    injuries: Option<&InjuryReport>,
) -> Team<'a> {
    Team {
        sport: league.sport,
        name,
        avg,
        vs_opponent_style: league.similar_defense(name, opponent_style),
        opponent_style,
        opponent_quality: league.opponent_quality(name),
        strength: league.schedule_strength(name),
        bounce_back: league.bounce_back(name),
        injuries: injuries.map(|report| team_impact(league.sport, report, name)),
    }
}

fn score(home: &Team, away: &Team, neutral_site: bool) -> Ledger {
    let mut ledger = Ledger::default();
    for rule in MATCHUP_RULES {
        ledger.both(home, away, rule);
    }
    if !neutral_site {
        home_field(&mut ledger, home, away);
    }
    for rule in EFFICIENCY_RULES.iter().chain(RECORD_RULES) {
        ledger.both(home, away, rule);
    }
    ledger
}

fn home_field(ledger: &mut Ledger, home: &Team, away: &Team) {
    let splits = &home.avg.splits;
    let edge = splits.home_advantage;
    let points = match home.sport {
        Sport::Nfl if splits.home_win_rate == 0.0 => 0.0,
        Sport::Cfb => {
            if edge > 0.25 {
                4.0
            } else if edge > 0.15 {
                3.5
            } else if edge > 0.05 {
                3.0
            } else if edge < -0.10 {
                1.0
            } else {
                2.5
            }
        }
        _ => {
            if edge > 0.25 {
                3.0
            } else if edge > 0.15 {
                2.5
            } else if edge > 0.05 {
                2.0
            } else if edge < -0.10 {
                0.5
            } else {
                1.5
            }
        }
    };
    ledger.award(Side::Home, points, format!("{} home field", home.name));

    let road = away.avg.splits.away_win_rate;
    if road >= 0.70 {
        let points = if road > splits.home_win_rate { 1.5 } else { 1.0 };
        ledger.award(Side::Away, points, format!("{} strong on the road", away.name));
    } else if road < 0.30 {
        ledger.award(Side::Home, 0.5, format!("{} poor on the road", away.name));
    }
}

fn is_nfl(team: &Team) -> bool {
    team.sport == Sport::Nfl
}

fn similar_opponents(me: &Team, _: &Team) -> Option<Award> {
    if !is_nfl(me) {
        return None;
    }
    let similar = me.vs_opponent_style.as_ref().filter(|s| s.games >= 2)?;
    let season = me.avg.defense.points_allowed;
    let style = me.opponent_style.label();
    if similar.avg_points_allowed < season - 3.0 {
        Award::own(1.5, format!("{} defense holds up against {style} offenses", me.name))
    } else if similar.avg_points_allowed > season + 3.0 {
        Award::opponent(1.5, format!("{} defense struggles against {style} offenses", me.name))
    } else {
        None
    }
}

fn ypp_matchup(me: &Team, them: &Team) -> Option<Award> {
    let ratio = me.avg.offense.yards_per_play / (them.avg.defense.yards_per_play_allowed + 0.1);
    let reason = |what: &str| format!("{} offense vs {} defense per play: {what}", me.name, them.name);
    if ratio > 1.2 {
        Award::own(3.5, reason("dominant"))
    } else if ratio > 1.1 {
        Award::own(2.5, reason("strong"))
    } else if ratio > 1.0 {
        Award::own(1.5, reason("slight edge"))
    } else if ratio < 0.85 {
        Award::opponent(2.0, reason("defense dominates"))
    } else if ratio < 0.95 {
        Award::opponent(1.0, reason("defense has the edge"))
    } else {
        None
    }
}

fn yardage_tier(ratio: f64) -> Option<f64> {
    if ratio > 1.3 {
        Some(2.5)
    } else if ratio > 1.1 {
        Some(1.5)
    } else if ratio > 1.0 {
        Some(0.75)
    } else {
        None
    }
}

fn rushing_matchup(me: &Team, them: &Team) -> Option<Award> {
    let ratio = me.avg.offense.rushing_yards / (them.avg.defense.rushing_yards_allowed + 0.1);
    let points = yardage_tier(ratio)?;
    Award::own(points, format!("{} run game vs {} run defense", me.name, them.name))
}

fn passing_matchup(me: &Team, them: &Team) -> Option<Award> {
    let ratio = me.avg.offense.passing_yards / (them.avg.defense.passing_yards_allowed + 0.1);
    let points = yardage_tier(ratio)?;
    Award::own(points, format!("{} pass game vs {} pass defense", me.name, them.name))
}

fn scoring_matchup(me: &Team, them: &Team) -> Option<Award> {
    let ratio = me.avg.offense.points_scored / (them.avg.defense.points_allowed + 0.1);
    if ratio > 1.25 {
        Award::own(2.5, format!("{} likely to score heavily", me.name))
    } else if ratio > 1.15 {
        Award::own(1.5, format!("{} likely to score well", me.name))
    } else {
        None
    }
}

fn third_down_edge(me: &Team, them: &Team) -> Option<Award> {
    let diff = me.avg.offense.third_down_rate - them.avg.offense.third_down_rate;
    if diff > 0.08 {
        Award::own(1.5, format!("{} significant third-down edge", me.name))
    } else if diff > 0.04 {
        Award::own(0.75, format!("{} third-down edge", me.name))
    } else {
        None
    }
}

fn pass_rush_edge(me: &Team, them: &Team) -> Option<Award> {
    let net = |t: &Team| t.avg.offense.sacks_made - t.avg.defense.sacks_allowed;
    let diff = net(me) - net(them);
    if diff > 1.0 {
        Award::own(1.5, format!("{} strong pass-rush advantage", me.name))
    } else if diff > 0.5 {
        Award::own(0.75, format!("{} pass-rush advantage", me.name))
    } else {
        None
    }
}

fn momentum(me: &Team, _: &Team) -> Option<Award> {
    let form = &me.avg.recent_form;
    if form.win_rate == 1.0 && form.games >= 3 {
        Award::own(2.0, format!("{} on a hot streak", me.name))
    } else if form.win_rate >= 0.67 {
        Award::own(1.0, format!("{} positive momentum", me.name))
    } else if form.win_rate == 0.0 && form.games >= 3 {
        Award::opponent(1.5, format!("{} struggling lately", me.name))
    } else {
        None
    }
}

fn opponent_quality(me: &Team, them: &Team) -> Option<Award> {
    if me.avg.win_rate < 0.5 {
        return None;
    }
    let margin = me.opponent_quality - them.opponent_quality;
    if margin > 0.15 {
        Award::own(1.5, format!("{} winning despite a tough schedule", me.name))
    } else if margin > 0.05 {
        Award::own(0.75, format!("{} has faced tougher opponents", me.name))
    } else {
        None
    }
}

fn schedule_strength(me: &Team, _: &Team) -> Option<Award> {
    if me.strength.faced_tough_defenses && me.avg.offense.points_scored > 22.0 {
        Award::own(1.5, format!("{} scoring well against elite defenses", me.name))
    } else if me.strength.faced_weak_defenses {
        Award::own(-2.0, format!("{} padded stats against weak defenses", me.name))
    } else {
        None
    }
}

fn close_games(me: &Team, _: &Team) -> Option<Award> {
    let close = &me.avg.close_games;
    if close.total >= 3 && close.win_rate > 0.60 {
        Award::own(1.0, format!("{} excels in close games", me.name))
    } else {
        None
    }
}

fn completion_matchup(me: &Team, them: &Team) -> Option<Award> {
    if !is_nfl(me) {
        return None;
    }
    let edge = me.avg.offense.completion_rate - them.avg.defense.completion_allowed;
    if edge > 0.10 {
        Award::own(2.0, format!("{} passing accuracy edge", me.name))
    } else if edge > 0.05 {
        Award::own(1.0, format!("{} slight passing accuracy edge", me.name))
    } else if edge < -0.10 {
        Award::opponent(1.5, format!("{} coverage limits {}", them.name, me.name))
    } else {
        None
    }
}

/// NFL compares red-zone touchdown rates; college uses points per 100 yards.
fn finishing_drives(me: &Team, them: &Team) -> Option<Award> {
    match me.sport {
        Sport::Nfl => {
            let edge = me.avg.offense.red_zone_rate - them.avg.defense.red_zone_allowed;
            if edge > 0.15 {
                Award::own(2.5, format!("{} big red-zone advantage", me.name))
            } else if edge > 0.08 {
                Award::own(1.5, format!("{} red-zone advantage", me.name))
            } else {
                None
            }
        }
        _ => {
            let mine = points_per_100_yards(me.avg);
            let theirs = points_per_100_yards(them.avg);
            if mine > theirs * 1.15 {
                Award::own(1.5, format!("{} converts yards into points", me.name))
            } else if mine > theirs * 1.05 {
                Award::own(0.75, format!("{} slightly more efficient scoring", me.name))
            } else {
                None
            }
        }
    }
}

fn points_per_100_yards(avg: &FootballAverages) -> f64 {
    if avg.offense.total_yards > 0.0 {
        avg.offense.points_scored / (avg.offense.total_yards / 100.0)
    } else {
        0.0
    }
}

fn rushing_efficiency(me: &Team, them: &Team) -> Option<Award> {
    if !is_nfl(me) {
        return None;
    }
    let edge = me.avg.offense.rushing_avg - them.avg.defense.rushing_avg_allowed;
    if edge > 1.5 {
        Award::own(2.0, format!("{} yards per carry edge", me.name))
    } else if edge > 0.8 {
        Award::own(1.0, format!("{} slight yards per carry edge", me.name))
    } else {
        None
    }
}

fn interception_risk(me: &Team, them: &Team) -> Option<Award> {
    if !is_nfl(me) {
        return None;
    }
    let risk = me.avg.offense.interceptions_thrown - them.avg.defense.interceptions_forced;
    if risk < -0.5 {
        Award::own(1.0, format!("{} protects the ball", me.name))
    } else if risk > 1.0 {
        Award::opponent(2.5, format!("{} ballhawks vs turnover-prone {}", them.name, me.name))
    } else if risk > 0.5 {
        Award::opponent(1.0, format!("{} interception risk", me.name))
    } else {
        None
    }
}

fn penalty_discipline(me: &Team, them: &Team) -> Option<Award> {
    if !is_nfl(me) {
        return None;
    }
    let diff = them.avg.offense.penalties - me.avg.offense.penalties;
    if diff > 2.0 {
        Award::own(1.5, format!("{} much more disciplined", me.name))
    } else if diff > 1.0 {
        Award::own(0.75, format!("{} more disciplined", me.name))
    } else {
        None
    }
}

fn win_rate_credit(me: &Team, _: &Team) -> Option<Award> {
    Award::own(me.avg.win_rate * 3.0, format!("{} win rate", me.name))
}

fn bounce_back(me: &Team, _: &Team) -> Option<Award> {
    if !me.bounce_back.potential {
        return None;
    }
    Award::own(
        me.bounce_back.score,
        format!("{} bounce-back: {}", me.name, me.bounce_back.factors.join("; ")),
    )
}

fn pythagorean_luck(me: &Team, _: &Team) -> Option<Award> {
    if me.avg.win_rate - me.avg.pythagorean_win_rate > 0.15 {
        Award::own(-1.0, format!("{} winning more than scoring supports", me.name))
    } else {
        None
    }
}

fn losing_record(me: &Team, _: &Team) -> Option<Award> {
    let rate = me.avg.win_rate;
    if rate == 0.0 {
        Award::own(-3.0, format!("{} winless", me.name))
    } else if rate < 0.2 {
        Award::own(-2.5, format!("{} poor record", me.name))
    } else if rate < 0.4 {
        Award::own(-1.5, format!("{} losing record", me.name))
    } else {
        None
    }
}

fn turnover_margin(me: &Team, them: &Team) -> Option<Award> {
    let diff = me.avg.turnover_margin - them.avg.turnover_margin;
    if diff > 1.0 {
        Award::own(1.5, format!("{} much better turnover margin", me.name))
    } else if diff > 0.5 {
        Award::own(0.75, format!("{} better turnover margin", me.name))
    } else {
        None
    }
}

fn qb_injury(me: &Team, them: &Team) -> Option<Award> {
    let (mine, theirs) = (me.injuries.as_ref()?, them.injuries.as_ref()?);
    if theirs.qb_injured && !mine.qb_injured {
        Award::own(5.0, format!("{} quarterback injured", them.name))
    } else {
        None
    }
}

fn injury_burden(me: &Team, them: &Team) -> Option<Award> {
    let (mine, theirs) = (me.injuries.as_ref()?, them.injuries.as_ref()?);
    let diff = theirs.impact_score - mine.impact_score;
    let reason = || format!("{} healthier than {}", me.name, them.name);
    if diff > 10.0 {
        Award::own(3.0, reason())
    } else if diff > 5.0 {
        Award::own(2.0, reason())
    } else if diff > 3.0 {
        Award::own(1.0, reason())
    } else {
        None
    }
}

/// Console narration of a football prediction.
pub fn render(result: &FootballPrediction) -> String {
    let p = &result.prediction;
    let rule = "=".repeat(100);
    let mut out = String::new();
    let _ = writeln!(out, "{rule}\nTEAM ANALYSIS\n{rule}");
    for (name, role, avg) in [
        (&p.home_team, if p.neutral_site { "Neutral" } else { "Home" }, &result.home_stats),
        (&p.away_team, if p.neutral_site { "Neutral" } else { "Away" }, &result.away_stats),
    ] {
        let losses = avg.games_played - avg.wins;
        let _ = writeln!(out, "\n{name} ({role}) {}-{losses}", avg.wins);
        let _ = writeln!(
            out,
            "  Offense: {:.1} yds/play, {:.1} pts/game, {:.1}% 3rd down",
            avg.offense.yards_per_play,
            avg.offense.points_scored,
            avg.offense.third_down_rate * 100.0
        );
        let _ = writeln!(
            out,
            "  Defense: {:.1} pts allowed/game, {:.1} yds/play allowed",
            avg.defense.points_allowed, avg.defense.yards_per_play_allowed
        );
        let _ = writeln!(
            out,
            "  Recent form: {}-{} | Turnover margin {:+.1} | Pythagorean {:.1}%",
            avg.recent_form.wins,
            avg.recent_form.games - avg.recent_form.wins,
            avg.turnover_margin,
            avg.pythagorean_win_rate * 100.0
        );
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
        let _ = writeln!(out, "PREDICTION: Too close to call\nConfidence: 50% (toss-up)");
    } else {
        let _ = writeln!(out, "PREDICTION: {} wins\nConfidence: {:.0}%", p.winner, p.confidence);
    }
    out
}
