pub mod aggregate;
pub mod api;
pub mod baseball_scoring;
pub mod batch;
pub mod calibration;
pub mod config;
pub mod error;
pub mod espn;
pub mod extract;
pub mod fantasy;
pub mod features;
pub mod football_scoring;
pub mod gbm;
pub mod http_cache;
pub mod http_client;
pub mod injuries;
pub mod league;
pub mod logging;
pub mod ml;
pub mod model;
pub mod park_factors;
pub mod pitchers;
pub mod prediction;
pub mod sport;
pub mod stat_parse;
pub mod store;
pub mod weather;
