mod common;

use common::{FakeSource, TEAMS, fixture_json, football_game, nfl_season, scoreboard_json, test_config};

use sports_predictor::aggregate::football_team;
use sports_predictor::batch::{self, BatchRequest};
use sports_predictor::espn::Bucket;
use sports_predictor::extract;
use sports_predictor::football_scoring;
use sports_predictor::injuries;
use sports_predictor::league::League;
use sports_predictor::model::SeasonPhase;
use sports_predictor::sport::Sport;
use sports_predictor::store;

#[test]
fn full_extract_stores_every_completed_game() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let season = nfl_season();
    let source = FakeSource::from_games(&season);

    let summary = extract::run_full(&source, &config, Sport::Nfl).unwrap();
    assert_eq!(summary.new_games, season.len());
    assert!(summary.errors.is_empty());

    let stored = store::read_games(&config.paths(Sport::Nfl).games).unwrap();
    assert_eq!(stored.len(), season.len());
    for (got, want) in stored.iter().zip(&season) {
        assert_eq!(got.event_id, want.event_id);
        assert_eq!(got.home.name, want.home.name);
        assert_eq!((got.home.score, got.away.score), (want.home.score, want.away.score));
        assert_eq!(got.week, want.week);
    }
}

#[test]
fn failed_summaries_are_reported_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let season = nfl_season();
    let mut source = FakeSource::from_games(&season);
    source.summaries.remove(&season[0].event_id);

    let summary = extract::run_full(&source, &config, Sport::Nfl).unwrap();
    assert_eq!(summary.new_games, season.len() - 1);
    assert_eq!(summary.errors.len(), 1);
    assert!(summary.errors[0].contains(&season[0].event_id));
}

#[test]
fn update_resumes_from_the_latest_week() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let season = nfl_season();
    extract::run_full(&FakeSource::from_games(&season), &config, Sport::Nfl).unwrap();

    let last_week = season.iter().filter_map(|g| g.week).max().unwrap();
    let mut grown = season.clone();
    grown.push(football_game("9001", last_week + 1, TEAMS[0], TEAMS[5], false));
    let summary = extract::run_update(&FakeSource::from_games(&grown), &config, Sport::Nfl).unwrap();

    assert_eq!(summary.total_games, grown.len());
    let stored = store::read_games(&config.paths(Sport::Nfl).games).unwrap();
    assert_eq!(stored.iter().filter(|g| g.event_id == "9001").count(), 1);
    // the resumed week is replaced, not duplicated
    let resumed = stored.iter().filter(|g| g.week == Some(last_week)).count();
    assert_eq!(resumed, season.iter().filter(|g| g.week == Some(last_week)).count());
}

#[test]
fn failed_update_keeps_stored_games() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let season = nfl_season();
    extract::run_full(&FakeSource::from_games(&season), &config, Sport::Nfl).unwrap();

    let mut outage = FakeSource::from_games(&season);
    outage.summaries.clear();
    let summary = extract::run_update(&outage, &config, Sport::Nfl).unwrap();

    assert!(!summary.errors.is_empty());
    assert_eq!(summary.new_games, 0);
    assert_eq!(summary.total_games, season.len());
    let stored = store::read_games(&config.paths(Sport::Nfl).games).unwrap();
    assert_eq!(stored.len(), season.len());
}

#[test]
fn shrunken_scoreboard_does_not_drop_games() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let season = nfl_season();
    extract::run_full(&FakeSource::from_games(&season), &config, Sport::Nfl).unwrap();

    let last_week = season.iter().filter_map(|g| g.week).max().unwrap();
    let first_of_last = season.iter().find(|g| g.week == Some(last_week)).unwrap();
    let mut rescored = first_of_last.clone();
    rescored.home.score += 3;
    // the resumed week now lists only one of its games, with a corrected score
    let source = FakeSource::from_games(std::slice::from_ref(&rescored));

    let summary = extract::run_update(&source, &config, Sport::Nfl).unwrap();
    assert!(summary.errors.is_empty());
    assert_eq!(summary.new_games, 0);

    let stored = store::read_games(&config.paths(Sport::Nfl).games).unwrap();
    assert_eq!(stored.len(), season.len());
    let updated = stored.iter().find(|g| g.event_id == rescored.event_id).unwrap();
    assert_eq!(updated.home.score, rescored.home.score);
}

#[test]
fn store_round_trip_keeps_scores_and_names() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("games.jsonl");
    let season = nfl_season();
    store::write_games(&path, &season[..10]).unwrap();
    store::append_games(&path, &season[10..]).unwrap();
    let stored = store::read_games(&path).unwrap();
    assert_eq!(stored.len(), season.len());
    for (got, want) in stored.iter().zip(&season) {
        assert_eq!(got.home.name, want.home.name);
        assert_eq!(got.away.name, want.away.name);
        assert_eq!((got.home.score, got.away.score), (want.home.score, want.away.score));
        assert_eq!(got.home.qb.as_ref().map(|q| &q.name), want.home.qb.as_ref().map(|q| &q.name));
    }
}

#[test]
fn malformed_store_line_names_the_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("games.jsonl");
    std::fs::write(&path, "{\"sport\": \"nfl\"}\n").unwrap();
    let err = store::read_games(&path).unwrap_err();
    assert!(format!("{err:#}").contains("line 1"));
}

#[test]
fn win_rate_is_wins_over_games() {
    let teams = store::football_teams(&nfl_season()).unwrap();
    for team in TEAMS {
        let avg = football_team(Sport::Nfl, &teams, team).unwrap();
        assert!(avg.games_played > 0);
        assert_eq!(avg.win_rate, avg.wins as f64 / avg.games_played as f64);
        assert!((0.0..=1.0).contains(&avg.pythagorean_win_rate));
    }
}

#[test]
fn neutral_site_predictions_are_symmetric() {
    let teams = store::football_teams(&nfl_season()).unwrap();
    let league = League::new(Sport::Nfl, &teams);
    for (a, b) in [(TEAMS[0], TEAMS[3]), (TEAMS[2], TEAMS[4]), (TEAMS[1], TEAMS[5])] {
        let ab = football_scoring::predict(&league, a, b, true, None).unwrap().prediction;
        let ba = football_scoring::predict(&league, b, a, true, None).unwrap().prediction;
        assert_eq!(ab.home_points, ba.away_points);
        assert_eq!(ab.away_points, ba.home_points);
        assert_eq!(ab.winner, ba.winner);
        assert_eq!(ab.confidence, ba.confidence);
    }
}

#[test]
fn stronger_team_is_favoured() {
    let teams = store::football_teams(&nfl_season()).unwrap();
    let league = League::new(Sport::Nfl, &teams);
    let result = football_scoring::predict(&league, TEAMS[0], TEAMS[5], false, None).unwrap();
    assert_eq!(result.prediction.winner, TEAMS[0]);
    assert!(result.prediction.confidence > 0.0);
    assert!(!result.prediction.factors.is_empty());
}

#[test]
fn unknown_team_is_rejected() {
    let teams = store::football_teams(&nfl_season()).unwrap();
    let league = League::new(Sport::Nfl, &teams);
    let err = football_scoring::predict(&league, "Nowhere Nomads", TEAMS[0], false, None).unwrap_err();
    assert!(err.is_client_error());
    assert!(err.to_string().contains("Nowhere Nomads"));
}

#[test]
fn batch_predicts_a_week_and_writes_reports() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let season = nfl_season();
    store::write_games(&config.paths(Sport::Nfl).games, &season).unwrap();

    let upcoming = [
        football_game("7001", 12, TEAMS[0], TEAMS[1], false),
        football_game("7002", 12, TEAMS[2], TEAMS[3], true),
        football_game("7003", 12, "Expansion Team", TEAMS[4], false),
    ];
    let entries: Vec<_> = upcoming.iter().map(|g| (g, false)).collect();
    let mut source = FakeSource::default();
    source.scoreboards.insert(
        Bucket::week(SeasonPhase::Regular, 12).label(),
        scoreboard_json(&entries),
    );

    let request = BatchRequest {
        sport: Sport::Nfl,
        week: 12,
        phase: SeasonPhase::Regular,
        use_ml: true,
    };
    let result = batch::run(&source, &config, &request).unwrap();

    assert_eq!(result.summary.total_games, 3);
    assert_eq!(result.summary.predicted_games, 2);
    assert_eq!(result.failed_games.len(), 1);
    assert_eq!(result.failed_games[0].home_team, "Expansion Team");
    assert!(result.predictions[1].is_neutral);
    // no trained model on disk, so the heuristic answers
    assert!(result.predictions.iter().all(|p| p.home_win_probability.is_none()));

    let paths = config.paths(Sport::Nfl);
    let text = std::fs::read_to_string(paths.predictions_txt(12)).unwrap();
    assert!(text.starts_with("NFL PREDICTIONS - WEEK 12"));
    assert!(text.contains("GAMES THAT COULD NOT BE PREDICTED (1):"));
    assert!(paths.predictions_xlsx(12).exists());
}

#[test]
fn batch_without_data_is_no_data() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let request = BatchRequest {
        sport: Sport::Nfl,
        week: 3,
        phase: SeasonPhase::Regular,
        use_ml: false,
    };
    let err = batch::run(&FakeSource::default(), &config, &request).unwrap_err();
    assert!(err.to_string().contains("run an extract first"));
}

#[test]
fn injury_refresh_replaces_the_snapshot_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());
    let paths = config.paths(Sport::Nfl);
    let source = FakeSource {
        injuries: Some(fixture_json("nfl_injuries.json")),
        ..FakeSource::default()
    };

    let summary = injuries::refresh(&source, &paths).unwrap();
    assert_eq!(summary.teams_with_data, 2);
    let report = injuries::load(&paths).unwrap().expect("snapshot written");
    assert_eq!(report["Kansas City Chiefs"].len(), 2);

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
        .collect();
    assert!(leftovers.is_empty());

    // an unavailable endpoint leaves the previous snapshot in place
    assert!(injuries::refresh(&FakeSource::default(), &paths).is_err());
    assert!(injuries::load(&paths).unwrap().is_some());
}
