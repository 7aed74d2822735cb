//! Read-through views of the player: current or recent track, and queue.
//!
//! The upstream queue endpoint answers with an empty queue whenever playback
//! is paused, even though the queue still exists on the client. The last
//! non-empty queue is kept as a snapshot and served in its place. Snapshots
//! are replaced at most once per interval so a polled integration does not
//! rewrite the cache on every call.
//!
//! A snapshot is served no matter how old it is while the upstream keeps
//! returning an empty queue.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Bytes;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use sonar_cache::{NO_EXPIRATION, SharedCache, SharedClock};
use tracing::{debug, warn};

use crate::error::{OAuthError, Result};

/// Cache key for the queue snapshot.
pub const CURRENT_QUEUE_KEY: &str = "current_queue";

/// Default minimum time between snapshot replacements.
pub const DEFAULT_SNAPSHOT_INTERVAL: Duration = Duration::from_secs(30);

const CURRENT_TRACK_PATH: &str = "/v1/me/player";
const RECENTLY_PLAYED_PATH: &str = "/v1/me/player/recently-played?limit=1";
const QUEUE_PATH: &str = "/v1/me/player/queue";

// ============================================================================
// Upstream shapes
// ============================================================================

/// Queue view. Only the queue array is interpreted; every other field
/// (e.g. `currently_playing`) is passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerQueue {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub queue: Vec<Value>,
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl PlayerQueue {
    /// A queue with no items and no other fields.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether the queue array has no items.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct RecentlyPlayed {
    #[serde(default, deserialize_with = "null_as_empty")]
    items: Vec<PlayHistory>,
}

#[derive(Debug, Deserialize)]
struct PlayHistory {
    track: Value,
}

/// Upstream sends `null` for an empty list.
fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// SnapshotStore
// ============================================================================

/// Last non-empty queue and when it was captured.
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub queue: PlayerQueue,
    pub captured_at: Instant,
}

/// Storage for the queue snapshot.
pub trait SnapshotStore: Send + Sync + std::fmt::Debug {
    /// The stored snapshot, if any.
    fn load(&self) -> Option<QueueSnapshot>;

    /// Replace the stored snapshot.
    fn store(&self, snapshot: QueueSnapshot);
}

/// Snapshot store backed by the TTL cache, entry never expires.
#[derive(Debug, Clone)]
pub struct CacheSnapshotStore {
    cache: SharedCache<QueueSnapshot>,
}

impl CacheSnapshotStore {
    pub fn new(cache: SharedCache<QueueSnapshot>) -> Self {
        Self { cache }
    }
}

impl SnapshotStore for CacheSnapshotStore {
    fn load(&self) -> Option<QueueSnapshot> {
        self.cache.get(CURRENT_QUEUE_KEY)
    }

    fn store(&self, snapshot: QueueSnapshot) {
        self.cache.set(CURRENT_QUEUE_KEY, snapshot, NO_EXPIRATION);
    }
}

// ============================================================================
// NowPlaying
// ============================================================================

/// Player views with fallback and snapshot smoothing.
#[derive(Debug)]
pub struct NowPlaying {
    client: Client,
    api_base: String,
    snapshots: Arc<dyn SnapshotStore>,
    clock: SharedClock,
    /// Serializes the check-and-replace of the snapshot.
    snapshot_update: Mutex<()>,
}

impl NowPlaying {
    /// Create player views against `api_base`.
    pub fn new(
        client: Client,
        api_base: impl Into<String>,
        snapshots: Arc<dyn SnapshotStore>,
        clock: SharedClock,
    ) -> Self {
        Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            snapshots,
            clock,
            snapshot_update: Mutex::new(()),
        }
    }

    /// Currently playing item, or the most recently played one.
    ///
    /// `query` is appended to the currently-playing request. Returns
    /// `Ok(None)` when neither endpoint has anything. The fallback shape is
    /// `{"item": <track>, "is_playing": false}`.
    pub async fn current_or_recent_track(
        &self,
        access_token: &str,
        query: Option<&str>,
    ) -> Result<Option<Value>> {
        if let Some(current) = self.current_track(access_token, query).await? {
            return Ok(Some(current));
        }
        debug!("Nothing currently playing, falling back to recently played");
        self.recent_track(access_token).await
    }

    /// Currently playing state, `None` when upstream has nothing.
    pub async fn current_track(
        &self,
        access_token: &str,
        query: Option<&str>,
    ) -> Result<Option<Value>> {
        let mut url = format!("{}{}", self.api_base, CURRENT_TRACK_PATH);
        if let Some(q) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(q);
        }

        match self.fetch(access_token, &url).await? {
            Some(body) => Ok(Some(serde_json::from_slice(&body)?)),
            None => Ok(None),
        }
    }

    /// Most recently played track marked as not playing.
    pub async fn recent_track(&self, access_token: &str) -> Result<Option<Value>> {
        let url = format!("{}{}", self.api_base, RECENTLY_PLAYED_PATH);
        let Some(body) = self.fetch(access_token, &url).await? else {
            return Ok(None);
        };

        let recent: RecentlyPlayed = serde_json::from_slice(&body)?;
        Ok(recent.items.into_iter().next().map(|played| {
            serde_json::json!({
                "item": played.track,
                "is_playing": false,
            })
        }))
    }

    /// Queue view, falling back to the last non-empty snapshot.
    ///
    /// A non-empty fresh queue replaces the snapshot when more than
    /// `interval` has passed since the last capture. An empty fresh queue
    /// yields the snapshot, or an empty queue if none exists.
    pub async fn queue(&self, access_token: &str, interval: Duration) -> Result<PlayerQueue> {
        let url = format!("{}{}", self.api_base, QUEUE_PATH);
        let fresh: PlayerQueue = match self.fetch(access_token, &url).await? {
            Some(body) => serde_json::from_slice(&body)?,
            None => PlayerQueue::empty(),
        };

        if fresh.is_empty() {
            return Ok(match self.snapshots.load() {
                Some(snapshot) => {
                    debug!(items = snapshot.queue.queue.len(), "Serving cached queue snapshot");
                    snapshot.queue
                }
                None => PlayerQueue::empty(),
            });
        }

        {
            let _guard = self.snapshot_update.lock();
            let now = self.clock.now();
            let stale = self
                .snapshots
                .load()
                .is_none_or(|s| now.saturating_duration_since(s.captured_at) > interval);
            if stale {
                debug!(items = fresh.queue.len(), "Replacing queue snapshot");
                self.snapshots.store(QueueSnapshot {
                    queue: fresh.clone(),
                    captured_at: now,
                });
            }
        }

        Ok(fresh)
    }

    /// GET `url` with the bearer token.
    ///
    /// `Ok(None)` for 204 or an empty body.
    async fn fetch(&self, access_token: &str, url: &str) -> Result<Option<Bytes>> {
        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, url, "Upstream request failed");
                OAuthError::UpstreamUnavailable(e.to_string())
            })?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, url, "Upstream returned an error");
            return Err(OAuthError::UpstreamStatus { status, body });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| OAuthError::UpstreamUnavailable(e.to_string()))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(body))
    }
}
