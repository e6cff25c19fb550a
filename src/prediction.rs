//! Outcome of a matchup and the running point ledger the heuristic scorers fill in.

use serde::Serialize;

use crate::sport::Sport;

pub const TIE: &str = "TIE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Home,
    Away,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
        }
    }
}

/// Who a rule credits, relative to the team it is evaluated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum To {
    Own,
    Opponent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Award {
    pub to: To,
    pub points: f64,
    pub reason: String,
}

impl Award {
    pub fn own(points: f64, reason: impl Into<String>) -> Option<Award> {
        Some(Award {
            to: To::Own,
            points,
            reason: reason.into(),
        })
    }

    pub fn opponent(points: f64, reason: impl Into<String>) -> Option<Award> {
        Some(Award {
            to: To::Opponent,
            points,
            reason: reason.into(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Factor {
    pub side: Side,
    pub points: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct Ledger {
    pub home_points: f64,
    pub away_points: f64,
    pub factors: Vec<Factor>,
}

impl Ledger {
    /// Runs `rule` once from each team's point of view and books both results as one step, so
    /// swapping home and away swaps the totals bit for bit.
    pub fn both<T>(&mut self, home: &T, away: &T, rule: impl Fn(&T, &T) -> Option<Award>) {
        let from_home = rule(home, away).map(|a| (Side::Home, a));
        let from_away = rule(away, home).map(|a| (Side::Away, a));

        let mut home_delta = 0.0;
        let mut away_delta = 0.0;
        for (evaluated_for, award) in from_home.into_iter().chain(from_away) {
            let side = match award.to {
                To::Own => evaluated_for,
                To::Opponent => evaluated_for.other(),
            };
            match side {
                Side::Home => home_delta += award.points,
                Side::Away => away_delta += award.points,
            }
            self.factors.push(Factor {
                side,
                points: award.points,
                reason: award.reason,
            });
        }
        self.home_points += home_delta;
        self.away_points += away_delta;
    }

    /// One-sided adjustments such as home field.
    pub fn award(&mut self, side: Side, points: f64, reason: impl Into<String>) {
        match side {
            Side::Home => self.home_points += points,
            Side::Away => self.away_points += points,
        }
        self.factors.push(Factor {
            side,
            points,
            reason: reason.into(),
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Heuristic,
    Ml,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub sport: Sport,
    pub method: Method,
    pub home_team: String,
    pub away_team: String,
    pub neutral_site: bool,
    pub home_points: f64,
    pub away_points: f64,
    /// Team name, or `TIE` when the totals are exactly level.
    pub winner: String,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home_win_probability: Option<f64>,
    pub factors: Vec<Factor>,
}

impl Prediction {
    pub fn from_ledger(
        sport: Sport,
        home_team: &str,
        away_team: &str,
        neutral_site: bool,
        ledger: Ledger,
    ) -> Self {
        let profile = sport.profile();
        let diff = (ledger.home_points - ledger.away_points).abs();
        let (winner, confidence) = if ledger.home_points > ledger.away_points {
            (home_team.to_string(), confidence(diff, profile.confidence_divisor, profile.confidence_cap))
        } else if ledger.away_points > ledger.home_points {
            (away_team.to_string(), confidence(diff, profile.confidence_divisor, profile.confidence_cap))
        } else {
            (TIE.to_string(), 50.0)
        };

        Self {
            sport,
            method: Method::Heuristic,
            home_team: home_team.to_string(),
            away_team: away_team.to_string(),
            neutral_site,
            home_points: ledger.home_points,
            away_points: ledger.away_points,
            winner,
            confidence,
            home_win_probability: None,
            factors: ledger.factors,
        }
    }

    pub fn is_tie(&self) -> bool {
        self.winner == TIE
    }

    pub fn home_favored(&self) -> bool {
        self.winner == self.home_team
    }
}

pub fn confidence(diff: f64, divisor: f64, cap: f64) -> f64 {
    (diff / divisor * 100.0).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bigger(a: &f64, b: &f64) -> Option<Award> {
        if a > b {
            Award::own(1.5, "bigger")
        } else if *a < b - 1.0 {
            Award::opponent(0.5, "much smaller")
        } else {
            None
        }
    }

    #[test]
    fn both_sides_are_booked_together() {
        let mut ledger = Ledger::default();
        ledger.both(&5.0, &2.0, bigger);
        assert_eq!(ledger.home_points, 2.0);
        assert_eq!(ledger.away_points, 0.0);
        assert_eq!(ledger.factors.len(), 2);
        assert!(ledger.factors.iter().all(|f| f.side == Side::Home));
    }

    #[test]
    fn football_confidence_caps_at_95() {
        let mut ledger = Ledger::default();
        ledger.award(Side::Away, 12.0, "blowout");
        let p = Prediction::from_ledger(Sport::Nfl, "H", "A", false, ledger);
        assert_eq!(p.winner, "A");
        assert_eq!(p.confidence, 95.0);
    }

    #[test]
    fn level_totals_are_a_tie() {
        let p = Prediction::from_ledger(Sport::Mlb, "H", "A", true, Ledger::default());
        assert!(p.is_tie());
        assert_eq!(p.confidence, 50.0);
    }

    #[test]
    fn baseball_confidence_scale() {
        let mut ledger = Ledger::default();
        ledger.award(Side::Home, 2.5, "edge");
        let p = Prediction::from_ledger(Sport::Mlb, "H", "A", false, ledger);
        assert!((p.confidence - 50.0).abs() < 1e-9);
    }
}
