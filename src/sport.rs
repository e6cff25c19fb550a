use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sport {
    Nfl,
    Mlb,
    Cfb,
}

impl Sport {
    pub const ALL: [Sport; 3] = [Sport::Nfl, Sport::Mlb, Sport::Cfb];

    pub fn key(self) -> &'static str {
        match self {
            Sport::Nfl => "nfl",
            Sport::Mlb => "mlb",
            Sport::Cfb => "cfb",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Sport::Nfl => "NFL",
            Sport::Mlb => "MLB",
            Sport::Cfb => "CFB",
        }
    }

    pub fn is_football(self) -> bool {
        matches!(self, Sport::Nfl | Sport::Cfb)
    }

    /// ESPN `site.api` path segment, e.g. `football/nfl`.
    pub fn espn_path(self) -> &'static str {
        match self {
            Sport::Nfl => "football/nfl",
            Sport::Mlb => "baseball/mlb",
            Sport::Cfb => "football/college-football",
        }
    }

    pub fn profile(self) -> SportProfile {
        match self {
            Sport::Nfl => SportProfile {
                recency_base: 1.5,
                pyth_exponent: 2.37,
                recent_window: 3,
                confidence_divisor: 6.0,
                confidence_cap: 95.0,
            },
            Sport::Cfb => SportProfile {
                recency_base: 1.5,
                pyth_exponent: 2.37,
                recent_window: 3,
                confidence_divisor: 6.0,
                confidence_cap: 95.0,
            },
            Sport::Mlb => SportProfile {
                recency_base: 2.0,
                pyth_exponent: 1.83,
                recent_window: 10,
                confidence_divisor: 5.0,
                confidence_cap: 92.0,
            },
        }
    }
}

/// Per-sport tuning constants shared by aggregation and scoring.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SportProfile {
    /// Newest-to-oldest weight ratio of the recency curve.
    pub recency_base: f64,
    pub pyth_exponent: f64,
    pub recent_window: usize,
    pub confidence_divisor: f64,
    pub confidence_cap: f64,
}

impl fmt::Display for Sport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Sport {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nfl" => Ok(Sport::Nfl),
            "mlb" => Ok(Sport::Mlb),
            "cfb" | "ncaaf" | "college-football" => Ok(Sport::Cfb),
            other => Err(anyhow!("unknown sport `{other}` (expected nfl, mlb or cfb)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Sport;

    #[test]
    fn parses_aliases() {
        assert_eq!("NFL".parse::<Sport>().unwrap(), Sport::Nfl);
        assert_eq!("ncaaf".parse::<Sport>().unwrap(), Sport::Cfb);
        assert!("nhl".parse::<Sport>().is_err());
    }

    #[test]
    fn baseball_profile_uses_longer_window() {
        let p = Sport::Mlb.profile();
        assert_eq!(p.recent_window, 10);
        assert!((p.pyth_exponent - 1.83).abs() < 1e-12);
    }
}
