use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ScrobbleConfig {
    pub user: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "https://ws.audioscrobbler.com/2.0/".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Clone, Default)]
pub struct ScrobbleService;

impl ScrobbleService {
    pub fn name(&self) -> &'static str {
        "scrobble"
    }

    pub fn status(&self) -> &'static str {
        "ready"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ScrobbleError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected status code: {0}")]
    HttpStatus(u16),
    #[error("malformed scrobble payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// The track currently playing on the configured scrobble account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub name: String,
    pub url: String,
    pub artist: String,
    pub image_url: String,
}

#[derive(Debug, Deserialize)]
struct RecentTracksResponse {
    recenttracks: RecentTracks,
}

#[derive(Debug, Deserialize)]
struct RecentTracks {
    #[serde(default)]
    track: Vec<Track>,
}

#[derive(Debug, Deserialize)]
struct Track {
    name: String,
    url: String,
    artist: TextNode,
    #[serde(default)]
    image: Vec<TextNode>,
    #[serde(rename = "@attr")]
    attr: Option<TrackAttr>,
}

#[derive(Debug, Default, Deserialize)]
struct TextNode {
    #[serde(rename = "#text", default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct TrackAttr {
    #[serde(default)]
    nowplaying: Option<String>,
}

/// Ask the scrobble API for the most recent track. Only a track flagged as
/// currently playing is returned; a finished scrobble comes back as `None`.
pub async fn fetch_now_playing(
    client: &reqwest::Client,
    config: &ScrobbleConfig,
) -> Result<Option<NowPlaying>, ScrobbleError> {
    let response = client
        .get(&config.base_url)
        .timeout(Duration::from_secs(config.timeout_secs))
        .query(&[
            ("method", "user.getRecentTracks"),
            ("user", config.user.as_str()),
            ("api_key", config.api_key.as_str()),
            ("format", "json"),
            ("limit", "1"),
            ("nowplaying", "true"),
        ])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ScrobbleError::HttpStatus(status.as_u16()));
    }

    let body = response.bytes().await?;
    let parsed: RecentTracksResponse = serde_json::from_slice(&body)?;
    let Some(track) = parsed.recenttracks.track.into_iter().next() else {
        return Ok(None);
    };
    let playing = track
        .attr
        .as_ref()
        .is_some_and(|attr| attr.nowplaying.is_some());
    if !playing {
        return Ok(None);
    }

    Ok(Some(NowPlaying {
        name: track.name,
        url: track.url,
        artist: track.artist.text,
        image_url: track
            .image
            .into_iter()
            .next()
            .unwrap_or_default()
            .text,
    }))
}

/// Render the now-playing HTML fragment: a heading plus the album art linked
/// to the track page.
pub fn now_playing_fragment(track: &NowPlaying) -> String {
    format!(
        "<h4>Now Playing</h4><span><img id=\"nowplayingimg\" src=\"{image}\"><a href=\"{url}\">{name} - {artist}</a></span>",
        image = track.image_url,
        url = track.url,
        name = track.name,
        artist = track.artist,
    )
}
