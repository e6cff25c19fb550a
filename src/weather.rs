//! Game-time weather at the home ballpark, from wttr.in, and its effect on scoring.

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::http_cache::{build_url, fetch_json};
use crate::park_factors::{Park, Roof, park_for};

const WTTR_BASE: &str = "https://wttr.in";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stadium {
    pub team: &'static str,
    pub city: &'static str,
    pub state: &'static str,
    pub lat: f64,
    pub lon: f64,
}

const fn stadium(team: &'static str, city: &'static str, state: &'static str, lat: f64, lon: f64) -> Stadium {
    Stadium {
        team,
        city,
        state,
        lat,
        lon,
    }
}

pub const STADIUMS: &[Stadium] = &[
    stadium("Arizona Diamondbacks", "Phoenix", "AZ", 33.4452, -112.0667),
    stadium("Atlanta Braves", "Atlanta", "GA", 33.8908, -84.4679),
    stadium("Baltimore Orioles", "Baltimore", "MD", 39.2838, -76.6217),
    stadium("Boston Red Sox", "Boston", "MA", 42.3467, -71.0972),
    stadium("Chicago Cubs", "Chicago", "IL", 41.9484, -87.6553),
    stadium("Chicago White Sox", "Chicago", "IL", 41.8299, -87.6338),
    stadium("Cincinnati Reds", "Cincinnati", "OH", 39.0974, -84.5067),
    stadium("Cleveland Guardians", "Cleveland", "OH", 41.4962, -81.6852),
    stadium("Colorado Rockies", "Denver", "CO", 39.7559, -104.9942),
    stadium("Detroit Tigers", "Detroit", "MI", 42.3390, -83.0485),
    stadium("Houston Astros", "Houston", "TX", 29.7573, -95.3555),
    stadium("Kansas City Royals", "Kansas City", "MO", 39.0517, -94.4803),
    stadium("Los Angeles Angels", "Anaheim", "CA", 33.8003, -117.8827),
    stadium("Los Angeles Dodgers", "Los Angeles", "CA", 34.0739, -118.2400),
    stadium("Miami Marlins", "Miami", "FL", 25.7781, -80.2197),
    stadium("Milwaukee Brewers", "Milwaukee", "WI", 43.0280, -87.9712),
    stadium("Minnesota Twins", "Minneapolis", "MN", 44.9817, -93.2778),
    stadium("New York Mets", "New York", "NY", 40.7571, -73.8458),
    stadium("New York Yankees", "New York", "NY", 40.8296, -73.9262),
    stadium("Oakland Athletics", "Oakland", "CA", 37.7516, -122.2005),
    stadium("Philadelphia Phillies", "Philadelphia", "PA", 39.9061, -75.1665),
    stadium("Pittsburgh Pirates", "Pittsburgh", "PA", 40.4469, -80.0057),
    stadium("San Diego Padres", "San Diego", "CA", 32.7073, -117.1566),
    stadium("San Francisco Giants", "San Francisco", "CA", 37.7786, -122.3893),
    stadium("Seattle Mariners", "Seattle", "WA", 47.5914, -122.3325),
    stadium("St. Louis Cardinals", "St. Louis", "MO", 38.6226, -90.1928),
    stadium("Tampa Bay Rays", "St. Petersburg", "FL", 27.7682, -82.6534),
    stadium("Texas Rangers", "Arlington", "TX", 32.7473, -97.0833),
    stadium("Toronto Blue Jays", "Toronto", "ON", 43.6414, -79.3894),
    stadium("Washington Nationals", "Washington", "DC", 38.8730, -77.0074),];

pub fn stadium_for(team: &str) -> Option<&'static Stadium> {
    STADIUMS.iter().find(|s| s.team == team)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherReport {
    pub temp_f: i32,
    pub temp_c: i32,
    pub wind_speed_mph: u32,
    /// 16-point compass, e.g. `SSW`.
    pub wind_dir: String,
    pub humidity: u32,
    pub precipitation_mm: f64,
    pub condition: String,
    pub location: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeatherSummary {
    pub weather: Option<WeatherReport>,
    pub impact: f64,
    pub notes: Vec<String>,
}

/// Current conditions from a wttr.in `format=j1` payload.
pub fn parse_wttr(root: &Value, location: &str) -> Result<WeatherReport> {
    let current = root
        .pointer("/current_condition/0")
        .ok_or_else(|| anyhow!("weather payload has no current_condition"))?;
    let field = |key: &str| -> Result<&str> {
        current
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("weather payload missing `{key}`"))
    };
    let number = |key: &str| -> Result<f64> {
        field(key)?
            .trim()
            .parse::<f64>()
            .with_context(|| format!("weather field `{key}` is not numeric"))
    };

    Ok(WeatherReport {
        temp_f: number("temp_F")?.round() as i32,
        temp_c: number("temp_C")?.round() as i32,
        wind_speed_mph: number("windspeedMiles")?.max(0.0).round() as u32,
        wind_dir: field("winddir16Point")?.to_string(),
        humidity: number("humidity")?.clamp(0.0, 100.0).round() as u32,
        precipitation_mm: number("precipMM").unwrap_or(0.0),
        condition: current
            .pointer("/weatherDesc/0/value")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string(),
        location: location.to_string(),
    })
}

pub fn fetch(client: &Client, team: &str) -> Result<Option<WeatherReport>> {
    let Some(stadium) = stadium_for(team) else {
        return Ok(None);
    };
    let location = format!("{}, {}", stadium.city, stadium.state);
    let url = build_url(
        &format!("{WTTR_BASE}/{},{}", stadium.city, stadium.state),
        &[("format", "j1".to_string())],
    )?;
    let root = fetch_json(client, &url, None)?;
    parse_wttr(&root, &location).map(Some)
}

/// Scoring points from the weather: heat, wind blowing out and humidity help hitters; cold,
/// wind blowing in and rain help pitchers. Domes are neutral.
pub fn impact(weather: &WeatherReport, park: &Park) -> (f64, Vec<String>) {
    if park.roof == Roof::Dome {
        return (0.0, vec!["Indoor dome - weather irrelevant".to_string()]);
    }

    let mut impact = 0.0;
    let mut notes = Vec::new();

    if weather.temp_f >= 85 {
        impact += 1.5;
        notes.push("Hot weather favors offense".to_string());
    } else if weather.temp_f >= 75 {
        impact += 0.5;
        notes.push("Warm weather slightly favors offense".to_string());
    } else if weather.temp_f <= 50 {
        impact -= 1.0;
        notes.push("Cold weather reduces offense".to_string());
    }

    let blowing_out = weather.wind_dir.contains("Out") || weather.wind_dir.contains('S');
    let wind = weather.wind_speed_mph;
    if wind >= 20 {
        if blowing_out {
            impact += 2.0;
            notes.push(format!("Strong wind ({wind} mph) blowing out"));
        } else {
            impact -= 2.0;
            notes.push(format!("Strong wind ({wind} mph) blowing in"));
        }
    } else if wind >= 12 {
        if blowing_out {
            impact += 1.0;
            notes.push("Moderate wind blowing out".to_string());
        } else {
            impact -= 1.0;
            notes.push("Moderate wind blowing in".to_string());
        }
    }

    if weather.humidity >= 70 {
        impact += 0.5;
        notes.push("High humidity helps ball carry".to_string());
    }
    if weather.precipitation_mm > 0.0 {
        impact -= 1.0;
        notes.push("Rain expected - reduces offense".to_string());
    }
    (impact, notes)
}

/// Weather lookup for the home team's park. A failed lookup is logged and scores zero.
pub fn summary(client: &Client, home_team: &str) -> WeatherSummary {
    let report = match fetch(client, home_team) {
        Ok(report) => report,
        Err(err) => {
            warn!(team = home_team, error = %err, "weather lookup failed");
            None
        }
    };
    summarize(report, &park_for(home_team))
}

pub fn summarize(report: Option<WeatherReport>, park: &Park) -> WeatherSummary {
    match report {
        Some(weather) => {
            let (impact, notes) = impact(&weather, park);
            WeatherSummary {
                weather: Some(weather),
                impact,
                notes,
            }
        }
        None => WeatherSummary {
            weather: None,
            impact: 0.0,
            notes: vec!["Weather data unavailable".to_string()],
        },
    }
}
