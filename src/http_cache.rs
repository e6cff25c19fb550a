use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use reqwest::StatusCode;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use serde::{Deserialize, Serialize};

const CACHE_VERSION: u32 = 1;

static CACHE: Mutex<Option<LoadedCache>> = Mutex::new(None);

struct LoadedCache {
    path: PathBuf,
    file: HttpCacheFile,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct HttpCacheFile {
    version: u32,
    entries: HashMap<String, CacheEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    body: String,
    etag: Option<String>,
    last_modified: Option<String>,
    fetched_at: i64,
}

pub fn build_url(base: &str, query: &[(&str, String)]) -> Result<Url> {
    Url::parse_with_params(base, query.iter().map(|(k, v)| (*k, v.as_str())))
        .with_context(|| format!("invalid url {base}"))
}

/// GET `url` as text. With a cache path, replays ETag/Last-Modified validators and serves the
/// stored body on 304.
pub fn fetch_text(client: &Client, url: &Url, cache_path: Option<&Path>) -> Result<String> {
    let key = url.as_str().to_string();
    let cached_entry = cache_path.and_then(|path| cached(path, &key));

    let mut req = client.get(url.clone());
    if let Some(entry) = cached_entry.as_ref() {
        if let Some(etag) = entry.etag.as_ref() {
            req = req.header(IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = entry.last_modified.as_ref() {
            req = req.header(IF_MODIFIED_SINCE, last_modified);
        }
    }

    let resp = req.send().with_context(|| format!("request failed: {url}"))?;
    let status = resp.status();
    let headers = resp.headers().clone();
    if status == StatusCode::NOT_MODIFIED {
        return match cached_entry {
            Some(entry) => Ok(entry.body),
            None => Err(anyhow!("received 304 without cache body for {url}")),
        };
    }

    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        let snippet: String = body.chars().take(200).collect();
        return Err(anyhow!("http {status} from {url}: {snippet}"));
    }

    if let Some(path) = cache_path {
        let entry = CacheEntry {
            body: body.clone(),
            etag: header_string(&headers, ETAG),
            last_modified: header_string(&headers, LAST_MODIFIED),
            fetched_at: chrono::Utc::now().timestamp(),
        };
        if entry.etag.is_some() || entry.last_modified.is_some() {
            store_entry(path, key, entry);
        }
    }
    Ok(body)
}

pub fn fetch_json(
    client: &Client,
    url: &Url,
    cache_path: Option<&Path>,
) -> Result<serde_json::Value> {
    let body = fetch_text(client, url, cache_path)?;
    serde_json::from_str(&body).with_context(|| format!("invalid json from {url}"))
}

fn header_string(
    headers: &reqwest::header::HeaderMap,
    name: reqwest::header::HeaderName,
) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

fn with_cache<T>(path: &Path, f: impl FnOnce(&mut HttpCacheFile) -> T) -> Option<T> {
    let mut guard = CACHE.lock().unwrap_or_else(|e| e.into_inner());
    let stale = guard.as_ref().is_none_or(|c| c.path != path);
    if stale {
        *guard = Some(LoadedCache {
            path: path.to_path_buf(),
            file: load_cache_file(path),
        });
    }
    guard.as_mut().map(|c| f(&mut c.file))
}

fn cached(path: &Path, key: &str) -> Option<CacheEntry> {
    with_cache(path, |c| c.entries.get(key).cloned()).flatten()
}

fn store_entry(path: &Path, key: String, entry: CacheEntry) {
    let saved = with_cache(path, |cache| {
        cache.version = CACHE_VERSION;
        cache.entries.insert(key, entry);
        save_cache_file(path, cache)
    });
    if let Some(Err(err)) = saved {
        tracing::debug!(error = %err, "http cache not persisted");
    }
}

fn load_cache_file(path: &Path) -> HttpCacheFile {
    let Ok(raw) = fs::read_to_string(path) else {
        return HttpCacheFile::default();
    };
    let cache = serde_json::from_str::<HttpCacheFile>(&raw).unwrap_or_default();
    if cache.version != CACHE_VERSION {
        return HttpCacheFile::default();
    }
    cache
}

fn save_cache_file(path: &Path, cache: &HttpCacheFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).ok();
    }
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_string(cache).context("serialize http cache")?;
    fs::write(&tmp, json).context("write http cache")?;
    fs::rename(&tmp, path).context("swap http cache")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_validators_are_found_again() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("http_cache.json");
        let key = "https://example.test/scoreboard?week=5";
        assert!(cached(&path, key).is_none());

        let entry = CacheEntry {
            body: "{}".to_string(),
            etag: Some("\"abc\"".to_string()),
            last_modified: None,
            fetched_at: 0,
        };
        store_entry(&path, key.to_string(), entry);
        let hit = cached(&path, key).expect("entry cached");
        assert_eq!(hit.etag.as_deref(), Some("\"abc\""));
        assert_eq!(hit.body, "{}");
        assert!(path.exists());
    }

    #[test]
    fn query_is_encoded_into_cache_key() {
        let url = build_url(
            "https://site.api.espn.com/apis/site/v2/sports/football/nfl/scoreboard",
            &[("seasontype", "2".to_string()), ("week", "5".to_string())],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://site.api.espn.com/apis/site/v2/sports/football/nfl/scoreboard?seasontype=2&week=5"
        );
    }
}
