//! Injury lists and their weighted impact on a team.
//!
//! NFL and MLB lists come from the ESPN injuries endpoint; college lists are maintained by hand
//! in a text file. Each injury contributes `position weight × status multiplier`.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::config::SportPaths;
use crate::error::PredictError;
use crate::espn::GameSource;
use crate::sport::Sport;

const KEY_INJURY_IMPACT: f64 = 2.0;
const TOP_IMPACTED: usize = 5;

const NFL_POSITION_WEIGHTS: &[(&str, f64)] = &[
    ("QB", 10.0),
    ("WR", 2.5),
    ("RB", 2.0),
    ("TE", 2.0),
    ("OL", 2.5),
    ("DE", 2.0),
    ("CB", 2.0),
    ("LB", 1.5),
    ("S", 1.5),
    ("DT", 1.5),
];

/// Checked in order by substring; the first hit wins.
const NFL_STATUS_MULTIPLIERS: &[(&str, f64)] = &[
    ("out", 1.0),
    ("ir", 1.0),
    ("injured reserve", 1.0),
    ("doubtful", 0.6),
    ("questionable", 0.2),
    ("active", 0.0),
];

const MLB_POSITION_WEIGHTS: &[(&str, f64)] = &[
    ("SP", 12.0),
    ("RP", 3.0),
    ("C", 3.5),
    ("SS", 3.0),
    ("1B", 2.5),
    ("2B", 2.5),
    ("3B", 2.5),
    ("OF", 2.0),
    ("DH", 2.0),
];

const MLB_STATUS_MULTIPLIERS: &[(&str, f64)] = &[
    ("out", 1.0),
    ("60-day", 1.0),
    ("15-day", 0.8),
    ("10-day", 0.7),
    ("day-to-day", 0.3),
    ("active", 0.0),
];

const CFB_POSITION_WEIGHTS: &[(&str, f64)] = &[
    ("QB", 5.0),
    ("RB", 2.5),
    ("WR", 2.0),
    ("TE", 1.5),
    ("OL", 2.0),
    ("DL", 2.5),
    ("LB", 2.0),
    ("CB", 2.0),
    ("S", 1.5),
    ("K", 0.5),
    ("P", 0.3),
];

/// Exact match on the upper-cased status.
const CFB_STATUS_MULTIPLIERS: &[(&str, f64)] = &[
    ("OUT", 1.0),
    ("DOUBTFUL", 0.75),
    ("QUESTIONABLE", 0.4),
    ("PROBABLE", 0.1),
];
const CFB_DEFAULT_STATUS: f64 = 0.5;

const NFL_POSITION_HINTS: &[(&str, &[&str])] = &[
    ("QB", &["quarterback", "qb ", " qb,", "passing", "threw for", "completed"]),
    ("RB", &["running back", "rb ", "carried", "rushing", "carries for"]),
    ("WR", &["receiver", "wr ", "caught", "receptions", "targets", "receiving"]),
    ("TE", &["tight end", "te "]),
    ("LB", &["linebacker", "lb ", "tackles"]),
    ("CB", &["cornerback", "cb ", "coverage", "pass defense"]),
    ("S", &["safety", "ss ", "fs "]),
    ("DE", &["defensive end", "de ", "edge", "sacks"]),
    ("DT", &["defensive tackle", "dt "]),
    ("OL", &["offensive line", "ol ", "guard", "tackle", "center"]),
];

const MLB_POSITION_HINTS: &[(&str, &[&str])] = &[
    ("SP", &["starting pitcher", "sp ", "starter", "pitched", "innings pitched", "earned runs"]),
    ("RP", &["relief", "reliever", "closer", "bullpen", "save opportunity"]),
    ("C", &["catcher", " c ", "behind the plate", "catching"]),
    ("1B", &["first base", "1b ", "first baseman"]),
    ("2B", &["second base", "2b ", "second baseman"]),
    ("3B", &["third base", "3b ", "third baseman"]),
    ("SS", &["shortstop", "ss "]),
    ("OF", &["outfield", "of ", "center field", "cf ", "left field", "lf ", "right field", "rf "]),
    ("DH", &["designated hitter", "dh ", " dh,"]),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InjuryRecord {
    pub player: String,
    pub position: String,
    pub status: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub date: String,
}

/// Team name -> current injury list.
pub type InjuryReport = BTreeMap<String, Vec<InjuryRecord>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjurySnapshot {
    pub sport: Sport,
    pub updated_at: String,
    pub teams: InjuryReport,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InjuryImpact {
    pub total_injuries: usize,
    pub out: usize,
    pub doubtful: usize,
    pub questionable: usize,
    pub day_to_day: usize,
    pub key_injuries: usize,
    pub impact_score: f64,
    pub injury_list: Vec<String>,
    pub qb_injured: bool,
    pub sp_injured: bool,
    pub closer_injured: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TeamInjuryCount {
    pub team: String,
    pub injury_count: usize,
    pub impact_score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefreshSummary {
    pub teams_with_data: usize,
    pub total_injuries: usize,
    pub top_impacted: Vec<TeamInjuryCount>,
}

pub fn detect_position(sport: Sport, comment: &str) -> &'static str {
    let hints = match sport {
        Sport::Mlb => MLB_POSITION_HINTS,
        Sport::Nfl | Sport::Cfb => NFL_POSITION_HINTS,
    };
    let lower = comment.to_lowercase();
    hints
        .iter()
        .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
        .map(|(pos, _)| *pos)
        .unwrap_or("UNKNOWN")
}

/// `{"injuries": [{"displayName": team, "injuries": [...]}]}`. `None` when the payload has no
/// injury list at all.
pub fn parse_espn_injuries(sport: Sport, root: &Value) -> Option<InjuryReport> {
    let teams = root.get("injuries")?.as_array()?;
    let mut report = InjuryReport::new();
    for team in teams {
        let name = team
            .get("displayName")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string();
        let entries = team
            .get("injuries")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let records = entries
            .iter()
            .map(|entry| {
                let comment = text(entry, "shortComment");
                InjuryRecord {
                    player: entry
                        .pointer("/athlete/displayName")
                        .and_then(Value::as_str)
                        .unwrap_or("Unknown")
                        .to_string(),
                    position: detect_position(sport, &comment).to_string(),
                    status: entry
                        .get("status")
                        .and_then(Value::as_str)
                        .unwrap_or("Unknown")
                        .to_string(),
                    comment,
                    date: text(entry, "date"),
                }
            })
            .collect();
        report.insert(name, records);
    }
    Some(report)
}

fn text(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Hand-maintained college list: a team name on its own line, then one
/// `Player - Position - Status` line per injury. `#` starts a comment.
pub fn parse_manual(raw: &str) -> InjuryReport {
    let mut report = InjuryReport::new();
    let mut current: Option<String> = None;
    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("---") {
            continue;
        }
        let parts: Vec<&str> = line.split(" - ").map(str::trim).collect();
        if parts.len() >= 3 {
            let Some(team) = current.as_ref() else {
                continue;
            };
            if let Some(list) = report.get_mut(team) {
                list.push(InjuryRecord {
                    player: parts[0].to_string(),
                    position: parts[1].to_uppercase(),
                    status: parts[2].to_string(),
                    comment: String::new(),
                    date: String::new(),
                });
            }
        } else {
            report.entry(line.to_string()).or_default();
            current = Some(line.to_string());
        }
    }
    report
}

pub fn impact(sport: Sport, records: &[InjuryRecord]) -> InjuryImpact {
    match sport {
        Sport::Cfb => college_impact(records),
        Sport::Nfl | Sport::Mlb => listed_impact(sport, records),
    }
}

/// Impact for one team; a team missing from a known report is healthy, not unknown.
pub fn team_impact(sport: Sport, report: &InjuryReport, team: &str) -> InjuryImpact {
    report
        .get(team)
        .map(|records| impact(sport, records))
        .unwrap_or_default()
}

fn listed_impact(sport: Sport, records: &[InjuryRecord]) -> InjuryImpact {
    let (weights, statuses) = match sport {
        Sport::Mlb => (MLB_POSITION_WEIGHTS, MLB_STATUS_MULTIPLIERS),
        _ => (NFL_POSITION_WEIGHTS, NFL_STATUS_MULTIPLIERS),
    };

    let mut out = InjuryImpact::default();
    for record in records {
        let status = record.status.to_lowercase();
        if status == "active" {
            continue;
        }
        out.total_injuries += 1;

        match sport {
            Sport::Mlb => {
                if ["out", "60-day", "15-day", "10-day"].iter().any(|s| status.contains(s)) {
                    out.out += 1;
                }
                if status.contains("day-to-day") {
                    out.day_to_day += 1;
                }
            }
            _ => {
                if matches!(status.as_str(), "out" | "ir" | "injured reserve") {
                    out.out += 1;
                }
                if status.contains("doubtful") {
                    out.doubtful += 1;
                }
                if status.contains("questionable") {
                    out.questionable += 1;
                }
            }
        }

        let weight = lookup(weights, &record.position).unwrap_or(1.0);
        let multiplier = statuses
            .iter()
            .find(|(key, _)| status.contains(key))
            .map(|(_, m)| *m)
            .unwrap_or(0.0);
        let player_impact = weight * multiplier;
        out.impact_score += player_impact;

        match record.position.as_str() {
            "QB" if multiplier > 0.5 => out.qb_injured = true,
            "SP" if multiplier > 0.5 => out.sp_injured = true,
            "RP" if multiplier > 0.5 && record.comment.to_lowercase().contains("closer") => {
                out.closer_injured = true
            }
            _ => {}
        }

        if player_impact >= KEY_INJURY_IMPACT {
            out.key_injuries += 1;
            out.injury_list
                .push(format!("{} ({}, {})", record.player, record.position, record.status));
        }
    }
    out
}

fn college_impact(records: &[InjuryRecord]) -> InjuryImpact {
    let mut out = InjuryImpact {
        total_injuries: records.len(),
        ..InjuryImpact::default()
    };
    for record in records {
        let position = record.position.to_uppercase();
        let status = record.status.to_uppercase();
        let weight = lookup(CFB_POSITION_WEIGHTS, &position).unwrap_or(1.0);
        let multiplier = lookup(CFB_STATUS_MULTIPLIERS, &status).unwrap_or(CFB_DEFAULT_STATUS);
        out.impact_score += weight * multiplier;

        if status.contains("OUT") || status.contains("IR") {
            out.out += 1;
            out.injury_list.push(format!("{} ({position})", record.player));
        } else if status.contains("DOUBT") {
            out.doubtful += 1;
            out.injury_list.push(format!("{} ({position})", record.player));
        } else if status.contains("QUESTION") {
            out.questionable += 1;
        }

        if position == "QB" && matches!(status.as_str(), "OUT" | "DOUBTFUL" | "IR") {
            out.qb_injured = true;
        }
    }
    out.key_injuries = out.injury_list.len();
    out
}

fn lookup(table: &[(&str, f64)], key: &str) -> Option<f64> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

pub fn summarize(sport: Sport, report: &InjuryReport) -> RefreshSummary {
    let mut busiest: Vec<TeamInjuryCount> = report
        .iter()
        .map(|(team, records)| TeamInjuryCount {
            team: team.clone(),
            injury_count: records.len(),
            impact_score: (impact(sport, records).impact_score * 100.0).round() / 100.0,
        })
        .collect();
    busiest.sort_by(|a, b| b.injury_count.cmp(&a.injury_count));
    busiest.truncate(TOP_IMPACTED);

    RefreshSummary {
        teams_with_data: report.len(),
        total_injuries: report.values().map(Vec::len).sum(),
        top_impacted: busiest,
    }
}

pub fn render_report(sport: Sport, report: &InjuryReport, stamp: &str) -> String {
    let rule = "=".repeat(100);
    let mut out = String::new();
    let _ = writeln!(out, "{} Injury Report - Updated: {stamp}", sport.label());
    let _ = writeln!(out, "{rule}\n");
    if report.is_empty() {
        out.push_str("No injury data available.\n");
        return out;
    }
    for (team, records) in report.iter().filter(|(_, r)| !r.is_empty()) {
        let _ = writeln!(out, "\n{team} ({} injuries)", records.len());
        let _ = writeln!(out, "{}", "-".repeat(80));
        for record in records {
            let _ = writeln!(out, "  {} ({})", record.player, record.position);
            let _ = writeln!(out, "    Status: {}", record.status);
            if !record.comment.is_empty() {
                let _ = writeln!(out, "    Detail: {}", record.comment);
            }
            out.push('\n');
        }
    }
    let _ = writeln!(out, "\n{rule}");
    let _ = writeln!(out, "Total teams with injuries: {}", report.len());
    out
}

/// Pull the current list (ESPN, or the manual file for college), write the text report and the
/// JSON snapshot predictions read from.
pub fn refresh(source: &impl GameSource, paths: &SportPaths) -> Result<RefreshSummary> {
    let sport = paths.sport;
    let report = match sport {
        Sport::Cfb => read_manual(&paths.injuries_manual)?
            .ok_or_else(|| PredictError::Upstream("no college injury file".to_string()))?,
        Sport::Nfl | Sport::Mlb => {
            let root = source.injuries(sport)?;
            parse_espn_injuries(sport, &root)
                .ok_or_else(|| PredictError::Upstream("injury API returned no data".to_string()))?
        }
    };
    save(paths, &report)?;
    let summary = summarize(sport, &report);
    info!(
        sport = %sport,
        teams = summary.teams_with_data,
        injuries = summary.total_injuries,
        "injury report refreshed"
    );
    Ok(summary)
}

pub fn save(paths: &SportPaths, report: &InjuryReport) -> Result<()> {
    let now = Utc::now();
    if let Some(dir) = paths.injuries_report.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let stamp = now.format("%Y-%m-%d %H:%M:%S").to_string();
    replace_file(&paths.injuries_report, &render_report(paths.sport, report, &stamp))?;

    let snapshot = InjurySnapshot {
        sport: paths.sport,
        updated_at: now.to_rfc3339(),
        teams: report.clone(),
    };
    let json = serde_json::to_string_pretty(&snapshot).context("serialize injury snapshot")?;
    replace_file(&paths.injuries_snapshot, &json)
}

fn replace_file(path: &Path, contents: &str) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("replace {}", path.display()))
}

/// The injury list predictions use, or `None` when nothing has been fetched yet.
pub fn load(paths: &SportPaths) -> Result<Option<InjuryReport>> {
    if paths.sport == Sport::Cfb {
        return read_manual(&paths.injuries_manual);
    }
    let raw = match fs::read_to_string(&paths.injuries_snapshot) {
        Ok(raw) => raw,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("read {}", paths.injuries_snapshot.display()));
        }
    };
    let snapshot: InjurySnapshot = serde_json::from_str(&raw)
        .with_context(|| format!("parse {}", paths.injuries_snapshot.display()))?;
    Ok(Some(snapshot.teams))
}

fn read_manual(path: &Path) -> Result<Option<InjuryReport>> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(parse_manual(&raw))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(position: &str, status: &str) -> InjuryRecord {
        InjuryRecord {
            player: "Player".to_string(),
            position: position.to_string(),
            status: status.to_string(),
            comment: String::new(),
            date: String::new(),
        }
    }

    #[test]
    fn quarterback_out_sets_flag_and_weight() {
        let impact = impact(Sport::Nfl, &[record("QB", "Out"), record("WR", "Questionable")]);
        assert!(impact.qb_injured);
        assert!((impact.impact_score - 10.5).abs() < 1e-9);
        assert_eq!(impact.out, 1);
        assert_eq!(impact.questionable, 1);
        assert_eq!(impact.key_injuries, 1);
    }

    #[test]
    fn active_players_do_not_count() {
        let impact = impact(Sport::Nfl, &[record("QB", "Active")]);
        assert_eq!(impact.total_injuries, 0);
        assert!(!impact.qb_injured);
    }

    #[test]
    fn doubtful_quarterback_is_flagged_questionable_is_not() {
        assert!(impact(Sport::Nfl, &[record("QB", "Doubtful")]).qb_injured);
        assert!(!impact(Sport::Nfl, &[record("QB", "Questionable")]).qb_injured);
    }

    #[test]
    fn starting_pitcher_on_il_is_flagged() {
        let impact = impact(Sport::Mlb, &[record("SP", "15-Day IL")]);
        assert!(impact.sp_injured);
        assert!((impact.impact_score - 9.6).abs() < 1e-9);
        assert_eq!(impact.out, 1);
    }

    #[test]
    fn positions_are_guessed_from_comments() {
        assert_eq!(detect_position(Sport::Nfl, "The quarterback threw for 200 yards"), "QB");
        assert_eq!(detect_position(Sport::Mlb, "Closer left the bullpen"), "RP");
        assert_eq!(detect_position(Sport::Nfl, "no hint"), "UNKNOWN");
    }

    #[test]
    fn espn_payload_parses_into_report() {
        let root = json!({"injuries": [{"displayName": "Team A", "injuries": [
            {"athlete": {"displayName": "Joe"}, "status": "Out",
             "shortComment": "Joe (ankle) is out; the receiver caught 5 passes", "date": "2024-10-01"}
        ]}]});
        let report = parse_espn_injuries(Sport::Nfl, &root).unwrap();
        assert_eq!(report["Team A"][0].position, "WR");
        assert!(parse_espn_injuries(Sport::Nfl, &json!({})).is_none());
    }

    #[test]
    fn manual_file_groups_players_under_teams() {
        let raw = "Alabama Crimson Tide\nJohn Doe - QB - OUT\nJane Smith - WR - QUESTIONABLE\n\nGeorgia Bulldogs\nSam Roe - K - PROBABLE\n";
        let report = parse_manual(raw);
        assert_eq!(report.len(), 2);
        assert_eq!(report["Alabama Crimson Tide"].len(), 2);
        let impact = impact(Sport::Cfb, &report["Alabama Crimson Tide"]);
        assert!(impact.qb_injured);
        assert!((impact.impact_score - 5.8).abs() < 1e-9);
        assert_eq!(impact.out, 1);
    }

    #[test]
    fn missing_team_is_healthy() {
        let report = InjuryReport::new();
        assert_eq!(team_impact(Sport::Nfl, &report, "Nobody"), InjuryImpact::default());
    }
}
