//! Last.fm metadata helpers
//!
//! Similar-artist discovery (feeds the mood tracker) and tag-to-artist
//! expansion (feeds the tag-weighted curation strategy). Every call is a
//! short-bounded request whose failure is logged and absorbed; the
//! scheduler loop must never block on or die from a metadata lookup.

use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

const API_ROOT: &str = "https://ws.audioscrobbler.com/2.0/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(3);

/// Thin last.fm API client. An empty API key disables all lookups.
#[derive(Debug, Clone)]
pub struct MetadataClient {
    http: reqwest::Client,
    api_key: String,
}

impl MetadataClient {
    pub fn new(api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self { http, api_key }
    }

    /// Disabled client for tests and keyless deployments
    pub fn disabled() -> Self {
        Self::new(String::new())
    }

    pub fn is_enabled(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Artists similar to `artist`, best-effort (empty on any failure)
    pub async fn similar_artists(&self, artist: &str) -> Vec<String> {
        if !self.is_enabled() {
            return Vec::new();
        }

        let json = match self
            .get(&[("method", "artist.getsimilar"), ("artist", artist), ("limit", "20")])
            .await
        {
            Some(json) => json,
            None => return Vec::new(),
        };

        let names = json
            .pointer("/similarartists/artist")
            .and_then(Value::as_array)
            .map(|artists| {
                artists
                    .iter()
                    .filter_map(|a| a.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        debug!("{} similar artists for '{}'", names.len(), artist);
        names
    }

    /// Top artists for one tag, best-effort (empty on any failure)
    pub async fn artists_for_tag(&self, tag: &str) -> Vec<String> {
        if !self.is_enabled() {
            return Vec::new();
        }

        let json = match self
            .get(&[("method", "tag.gettopartists"), ("tag", tag), ("limit", "50")])
            .await
        {
            Some(json) => json,
            None => return Vec::new(),
        };

        json.pointer("/topartists/artist")
            .and_then(Value::as_array)
            .map(|artists| {
                artists
                    .iter()
                    .filter_map(|a| a.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Union of artists over several tags, deduplicated case-insensitively
    pub async fn artists_from_tags(&self, tags: &[String]) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        let mut artists = Vec::new();
        for tag in tags {
            for artist in self.artists_for_tag(tag).await {
                if seen.insert(artist.to_lowercase()) {
                    artists.push(artist);
                }
            }
        }
        artists
    }

    async fn get(&self, params: &[(&str, &str)]) -> Option<Value> {
        let result = self
            .http
            .get(API_ROOT)
            .query(params)
            .query(&[("api_key", self.api_key.as_str()), ("format", "json")])
            .send()
            .await;

        match result {
            Ok(response) => match response.json::<Value>().await {
                Ok(json) => Some(json),
                Err(e) => {
                    warn!("last.fm response parse error: {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("last.fm request failed: {}", e);
                None
            }
        }
    }
}

/// Extract `#tag` tokens from a station name, camel-case split into words
/// ("#IndieRock" becomes "indie rock").
pub fn tags_from_station_name(name: &str) -> Vec<String> {
    name.split_whitespace()
        .filter_map(|token| token.strip_prefix('#'))
        .filter(|tag| !tag.is_empty())
        .map(split_tag_into_words)
        .collect()
}

fn split_tag_into_words(tag: &str) -> String {
    let mut words = String::new();
    for (i, c) in tag.chars().enumerate() {
        if c.is_uppercase() && i > 0 {
            words.push(' ');
        }
        words.extend(c.to_lowercase());
    }
    words
}
