use criterion::{Criterion, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;

use sports_predictor::aggregate::league_football;
use sports_predictor::espn::{Bucket, parse_json, parse_summary};
use sports_predictor::features::{FEATURE_COUNT, TeamSnapshot, matchup_features};
use sports_predictor::gbm::{Gbm, GbmParams};
use sports_predictor::league::League;
use sports_predictor::model::{FootballTeams, SeasonPhase, StoredGame};
use sports_predictor::sport::Sport;
use sports_predictor::store::football_teams;

const TEAM_NAMES: [&str; 8] = [
    "Kansas City Chiefs",
    "Baltimore Ravens",
    "Buffalo Bills",
    "Detroit Lions",
    "Philadelphia Eagles",
    "San Francisco 49ers",
    "Houston Texans",
    "Green Bay Packers",
];

fn sample_game() -> StoredGame {
    let root = parse_json(NFL_SUMMARY_JSON).unwrap();
    parse_summary(Sport::Nfl, &Bucket::week(SeasonPhase::Regular, 1), None, "1", &root).unwrap()
}

/// A 17-week season: the parsed fixture game replayed between rotating opponents.
fn sample_teams() -> FootballTeams {
    let base = sample_game();
    let mut games = Vec::new();
    for week in 1..=17u32 {
        for i in 0..TEAM_NAMES.len() / 2 {
            let mut game = base.clone();
            let home = (i + week as usize) % TEAM_NAMES.len();
            let away = (home + 1 + 2 * i) % TEAM_NAMES.len();
            if home == away {
                continue;
            }
            game.event_id = format!("{week}-{i}");
            game.week = Some(week);
            game.home.name = TEAM_NAMES[home].to_string();
            game.away.name = TEAM_NAMES[away].to_string();
            game.home.score = 17 + (week * 3 + i as u32) % 17;
            game.away.score = 14 + (week * 5 + 2 * i as u32) % 19;
            games.push(game);
        }
    }
    football_teams(&games).unwrap()
}

fn bench_summary_parse(c: &mut Criterion) {
    let root = parse_json(NFL_SUMMARY_JSON).unwrap();
    let bucket = Bucket::week(SeasonPhase::Regular, 1);
    c.bench_function("summary_parse", |b| {
        b.iter(|| {
            let game = parse_summary(Sport::Nfl, &bucket, None, "1", black_box(&root)).unwrap();
            black_box(game.home.score);
        })
    });
}

fn bench_league_aggregation(c: &mut Criterion) {
    let teams = sample_teams();
    c.bench_function("league_aggregation", |b| {
        b.iter(|| {
            let league = league_football(Sport::Nfl, black_box(&teams));
            black_box(league.len());
        })
    });
}

fn bench_matchup_features(c: &mut Criterion) {
    let teams = sample_teams();
    let league = League::new(Sport::Nfl, &teams);
    let (home, away) = (TEAM_NAMES[0], TEAM_NAMES[1]);
    let (Some(home_avg), Some(away_avg)) = (league.averages(home), league.averages(away)) else {
        panic!("sample teams should have averages");
    };
    let (home_games, away_games) = (league.games(home), league.games(away));
    c.bench_function("matchup_features", |b| {
        b.iter(|| {
            let h = TeamSnapshot {
                avg: home_avg,
                games: &home_games,
                injury: None,
            };
            let a = TeamSnapshot {
                avg: away_avg,
                games: &away_games,
                injury: None,
            };
            black_box(matchup_features(black_box(&h), black_box(&a)));
        })
    });
}

fn bench_gbm_inference(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let rows: Vec<Vec<f64>> = (0..300)
        .map(|_| (0..FEATURE_COUNT).map(|_| rng.r#gen::<f64>() - 0.5).collect())
        .collect();
    let labels: Vec<f64> = rows
        .iter()
        .map(|r| if r[0] + 0.5 * r[3] > 0.0 { 1.0 } else { 0.0 })
        .collect();
    let params = GbmParams {
        n_trees: 100,
        ..GbmParams::default()
    };
    let model = Gbm::fit(&rows, &labels, &params).unwrap();

    c.bench_function("gbm_predict_one", |b| {
        b.iter(|| black_box(model.predict_proba(black_box(&rows[17]))))
    });
    c.bench_function("gbm_predict_300", |b| {
        b.iter(|| black_box(model.predict_many(black_box(&rows)).len()))
    });
}

criterion_group!(
    perf,
    bench_summary_parse,
    bench_league_aggregation,
    bench_matchup_features,
    bench_gbm_inference
);
criterion_main!(perf);

static NFL_SUMMARY_JSON: &str = include_str!("../tests/fixtures/nfl_summary.json");
