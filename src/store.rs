//! Line-delimited JSON game store. One `StoredGame` per line, both teams in one record.

use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Local};
use serde::Serialize;

use crate::model::{
    BaseballSides, BaseballTeams, BoxScore, FootballSides, FootballTeams, GameRecord, GameResult,
    Location, StoredGame, TeamLine, TeamsData,
};

/// A missing file reads as an empty store. A malformed line is an error naming the line.
pub fn read_games(path: &Path) -> Result<Vec<StoredGame>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("open {}", path.display())),
    };

    let mut games = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("read {}", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let game: StoredGame = serde_json::from_str(&line)
            .with_context(|| format!("{} line {}: malformed game record", path.display(), idx + 1))?;
        games.push(game);
    }
    Ok(games)
}

/// Replaces the whole file atomically.
pub fn write_games(path: &Path, games: &[StoredGame]) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let tmp = path.with_extension("jsonl.tmp");
    {
        let file = File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
        let mut out = BufWriter::new(file);
        for game in games {
            write_line(&mut out, game)?;
        }
        out.flush().context("flush game store")?;
    }
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}

pub fn append_games(path: &Path, games: &[StoredGame]) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open {} for append", path.display()))?;
    let mut out = BufWriter::new(file);
    for game in games {
        write_line(&mut out, game)?;
    }
    out.flush().context("flush game store")?;
    Ok(())
}

fn write_line(out: &mut impl Write, game: &StoredGame) -> Result<()> {
    serde_json::to_writer(&mut *out, game).context("serialize game")?;
    out.write_all(b"\n").context("write game")?;
    Ok(())
}

pub fn football_teams(games: &[StoredGame]) -> Result<FootballTeams> {
    expand(games, |game, own, opp| {
        let (BoxScore::Football(off), BoxScore::Football(def)) = (&own.stats, &opp.stats) else {
            return Err(anyhow!("game {}: expected football box scores", game.event_id));
        };
        Ok(FootballSides {
            off: off.clone(),
            def: def.clone(),
            qb: own.qb.clone(),
        })
    })
}

pub fn baseball_teams(games: &[StoredGame]) -> Result<BaseballTeams> {
    expand(games, |game, own, opp| {
        let (BoxScore::Baseball(batting), BoxScore::Baseball(opponent)) = (&own.stats, &opp.stats)
        else {
            return Err(anyhow!("game {}: expected baseball box scores", game.event_id));
        };
        Ok(BaseballSides {
            batting: batting.clone(),
            opponent: opponent.clone(),
        })
    })
}

pub fn load_football(path: &Path) -> Result<FootballTeams> {
    football_teams(&read_games(path)?)
}

pub fn load_baseball(path: &Path) -> Result<BaseballTeams> {
    baseball_teams(&read_games(path)?)
}

/// Each decided game becomes one record per team, in file order. Ties credit nobody.
fn expand<S>(
    games: &[StoredGame],
    sides: impl Fn(&StoredGame, &TeamLine, &TeamLine) -> Result<S>,
) -> Result<TeamsData<S>> {
    let mut teams: TeamsData<S> = TeamsData::new();
    for game in games {
        if game.is_tie() {
            continue;
        }
        for (own, opp, location) in [
            (&game.home, &game.away, Location::Home),
            (&game.away, &game.home, Location::Away),
        ] {
            let record = GameRecord {
                opponent: opp.name.clone(),
                location,
                result: if own.score > opp.score {
                    GameResult::Win
                } else {
                    GameResult::Loss
                },
                score_for: own.score,
                score_against: opp.score,
                phase: game.phase,
                week: game.week,
                stats: sides(game, own, opp)?,
            };
            teams.entry(own.name.clone()).or_default().push(record);
        }
    }
    Ok(teams)
}

pub fn team_names(games: &[StoredGame]) -> Vec<String> {
    let names: BTreeSet<&str> = games
        .iter()
        .flat_map(|g| [g.home.name.as_str(), g.away.name.as_str()])
        .collect();
    names.into_iter().map(str::to_string).collect()
}

/// The chronologically last stored game, used to resume an update run.
pub fn latest_game(games: &[StoredGame]) -> Option<&StoredGame> {
    games.iter().max_by_key(|g| g.bucket_key())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileStatus {
    pub file_exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_kb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,
}

pub fn file_status(path: &Path) -> FileStatus {
    let Ok(meta) = fs::metadata(path) else {
        return FileStatus::default();
    };
    let modified_at = meta
        .modified()
        .ok()
        .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%dT%H:%M:%S").to_string());
    FileStatus {
        file_exists: true,
        size_kb: Some((meta.len() as f64 / 1024.0 * 100.0).round() / 100.0),
        modified_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BaseballBox, FootballBox, SeasonPhase};
    use crate::sport::Sport;

    fn football_game(id: &str, week: u32, home: (&str, u32), away: (&str, u32)) -> StoredGame {
        StoredGame {
            sport: Sport::Nfl,
            event_id: id.to_string(),
            phase: SeasonPhase::Regular,
            week: Some(week),
            date: None,
            neutral_site: false,
            home: TeamLine {
                name: home.0.to_string(),
                score: home.1,
                stats: BoxScore::Football(FootballBox {
                    total_yards: 350.0,
                    ..FootballBox::default()
                }),
                qb: None,
            },
            away: TeamLine {
                name: away.0.to_string(),
                score: away.1,
                stats: BoxScore::Football(FootballBox {
                    total_yards: 280.0,
                    ..FootballBox::default()
                }),
                qb: None,
            },
        }
    }

    #[test]
    fn round_trip_preserves_scores_and_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nfl_games.jsonl");
        let games = vec![
            football_game("1", 1, ("Kansas City Chiefs", 27), ("Baltimore Ravens", 20)),
            football_game("2", 1, ("Green Bay Packers", 17), ("Chicago Bears", 24)),
        ];
        write_games(&path, &games).unwrap();
        let back = read_games(&path).unwrap();
        assert_eq!(back, games);
        assert_eq!(back[0].home.name, "Kansas City Chiefs");
        assert_eq!(back[1].away.score, 24);
    }

    #[test]
    fn append_extends_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nfl_games.jsonl");
        write_games(&path, &[football_game("1", 1, ("A", 1), ("B", 0))]).unwrap();
        append_games(&path, &[football_game("2", 2, ("B", 3), ("A", 0))]).unwrap();
        assert_eq!(read_games(&path).unwrap().len(), 2);
    }

    #[test]
    fn malformed_line_names_its_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        let good = serde_json::to_string(&football_game("1", 1, ("A", 1), ("B", 0))).unwrap();
        fs::write(&path, format!("{good}\n{{\"sport\":\"nfl\"\n")).unwrap();
        let err = read_games(&path).unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_games(&dir.path().join("none.jsonl")).unwrap().is_empty());
    }

    #[test]
    fn expansion_builds_both_perspectives() {
        let games = vec![football_game("1", 1, ("A", 30), ("B", 10))];
        let teams = football_teams(&games).unwrap();
        let a = &teams["A"][0];
        let b = &teams["B"][0];
        assert_eq!(a.result, GameResult::Win);
        assert_eq!(a.location, Location::Home);
        assert_eq!(b.result, GameResult::Loss);
        assert_eq!(b.opponent, "A");
        assert_eq!(a.stats.def.total_yards, 280.0);
        assert_eq!(b.stats.off.total_yards, 280.0);
        assert_eq!(a.point_diff(), 20);
    }

    #[test]
    fn ties_are_not_credited() {
        let games = vec![football_game("1", 1, ("A", 20), ("B", 20))];
        assert!(football_teams(&games).unwrap().is_empty());
    }

    #[test]
    fn mixed_box_scores_fail_loudly() {
        let mut game = football_game("9", 1, ("A", 3), ("B", 2));
        game.away.stats = BoxScore::Baseball(BaseballBox::default());
        assert!(football_teams(&[game]).is_err());
    }

    #[test]
    fn latest_game_orders_by_phase_then_week() {
        let mut pre = football_game("1", 3, ("A", 1), ("B", 0));
        pre.phase = SeasonPhase::Preseason;
        let reg = football_game("2", 2, ("A", 1), ("B", 0));
        let games = vec![reg.clone(), pre];
        assert_eq!(latest_game(&games).map(|g| g.event_id.as_str()), Some("2"));
    }
}
