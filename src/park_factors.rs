//! Ballpark run environment. 100 is neutral; above favours hitters, below favours pitchers.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Roof {
    Open,
    Retractable,
    Dome,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Park {
    pub team: &'static str,
    pub name: &'static str,
    pub run_factor: u32,
    pub hr_factor: u32,
    /// Feet above sea level.
    pub altitude: u32,
    pub roof: Roof,
}

const fn park(
    team: &'static str,
    name: &'static str,
    run_factor: u32,
    hr_factor: u32,
    altitude: u32,
    roof: Roof,
) -> Park {
    Park {
        team,
        name,
        run_factor,
        hr_factor,
        altitude,
        roof,
    }
}

const UNKNOWN: Park = park("", "Unknown", 100, 100, 0, Roof::Open);

pub const PARKS: &[Park] = &[
    park("Arizona Diamondbacks", "Chase Field", 102, 106, 1086, Roof::Retractable),
    park("Atlanta Braves", "Truist Park", 99, 98, 1050, Roof::Open),
    park("Baltimore Orioles", "Oriole Park at Camden Yards", 104, 109, 33, Roof::Open),
    park("Boston Red Sox", "Fenway Park", 103, 101, 20, Roof::Open),
    park("Chicago Cubs", "Wrigley Field", 107, 110, 595, Roof::Open),
    park("Chicago White Sox", "Guaranteed Rate Field", 101, 103, 595, Roof::Open),
    park("Cincinnati Reds", "Great American Ball Park", 106, 112, 550, Roof::Open),
    park("Cleveland Guardians", "Progressive Field", 98, 95, 653, Roof::Open),
    park("Colorado Rockies", "Coors Field", 115, 124, 5200, Roof::Open),
    park("Detroit Tigers", "Comerica Park", 96, 92, 585, Roof::Open),
    park("Houston Astros", "Minute Maid Park", 101, 100, 43, Roof::Retractable),
    park("Kansas City Royals", "Kauffman Stadium", 99, 97, 910, Roof::Open),
    park("Los Angeles Angels", "Angel Stadium", 98, 97, 160, Roof::Open),
    park("Los Angeles Dodgers", "Dodger Stadium", 97, 96, 340, Roof::Open),
    park("Miami Marlins", "loanDepot park", 95, 94, 10, Roof::Retractable),
    park("Milwaukee Brewers", "American Family Field", 101, 100, 635, Roof::Retractable),
    park("Minnesota Twins", "Target Field", 100, 101, 840, Roof::Open),
    park("New York Mets", "Citi Field", 97, 95, 14, Roof::Open),
    park("New York Yankees", "Yankee Stadium", 103, 108, 55, Roof::Open),
    park("Oakland Athletics", "Oakland Coliseum", 97, 96, 25, Roof::Open),
    park("Philadelphia Phillies", "Citizens Bank Park", 104, 107, 39, Roof::Open),
    park("Pittsburgh Pirates", "PNC Park", 98, 97, 730, Roof::Open),
    park("San Diego Padres", "Petco Park", 94, 93, 20, Roof::Open),
    park("San Francisco Giants", "Oracle Park", 92, 88, 10, Roof::Open),
    park("Seattle Mariners", "T-Mobile Park", 97, 95, 10, Roof::Retractable),
    park("St. Louis Cardinals", "Busch Stadium", 100, 100, 465, Roof::Open),
    park("Tampa Bay Rays", "Tropicana Field", 96, 97, 12, Roof::Dome),
    park("Texas Rangers", "Globe Life Field", 105, 108, 551, Roof::Retractable),
    park("Toronto Blue Jays", "Rogers Centre", 101, 102, 300, Roof::Retractable),
    park("Washington Nationals", "Nationals Park", 99, 100, 25, Roof::Open),];

/// The home team's park, or a neutral placeholder for teams not in the table.
pub fn park_for(team: &str) -> Park {
    PARKS.iter().find(|p| p.team == team).copied().unwrap_or(UNKNOWN)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatKind {
    Runs,
    HomeRuns,
}

/// Multiplier applied to a stat at this park, e.g. 1.15 at Coors Field.
pub fn adjustment(team: &str, kind: StatKind) -> f64 {
    let park = park_for(team);
    let factor = match kind {
        StatKind::Runs => park.run_factor,
        StatKind::HomeRuns => park.hr_factor,
    };
    factor as f64 / 100.0
}

/// Prediction points for the park: positive for hitter parks, negative for pitcher parks.
pub fn impact_score(team: &str) -> f64 {
    match park_for(team).run_factor {
        f if f >= 115 => 5.0,
        f if f >= 106 => 3.0,
        f if f >= 103 => 1.5,
        f if f <= 92 => -3.0,
        f if f <= 96 => -1.5,
        _ => 0.0,
    }
}
