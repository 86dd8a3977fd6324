//! Per-user pending request storage
//!
//! Each user has at most one [`PendingRequest`]: the link they most recently
//! submitted, waiting for a format choice or being processed. Entries live in
//! a `moka` cache with a time-to-live so abandoned menus don't accumulate.
//! A request that is being processed does not expire; its job removes it.

use crate::extractor::MediaMetadata;
use crate::flow::choice::Choice;
use moka::future::Cache;
use moka::notification::RemovalCause;
use moka::ops::compute::{CompResult, Op};
use moka::Expiry;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Where a pending request is in its lifecycle
#[derive(Debug, Clone)]
pub enum RequestStage {
    /// Menu shown, waiting for a button press
    AwaitingSelection,
    /// A format was chosen and the download is running
    Processing {
        /// The chosen format
        choice: Choice,
        /// Cancels the running download
        cancel: CancellationToken,
    },
}

/// The single in-flight link of one user
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// Distinguishes successive requests of the same user
    pub id: Uuid,
    /// Telegram user ID
    pub user_id: i64,
    /// The submitted link
    pub url: String,
    /// Extracted title
    pub title: String,
    /// Duration in seconds, if known
    pub duration: Option<u64>,
    /// Uploader, if known
    pub uploader: Option<String>,
    /// Lifecycle stage
    pub stage: RequestStage,
}

impl PendingRequest {
    /// New request awaiting a selection
    #[must_use]
    pub fn new(user_id: i64, url: impl Into<String>, metadata: MediaMetadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            url: url.into(),
            title: metadata.title,
            duration: metadata.duration,
            uploader: metadata.uploader,
            stage: RequestStage::AwaitingSelection,
        }
    }

    /// `true` while a download is running for this request
    #[must_use]
    pub const fn is_processing(&self) -> bool {
        matches!(self.stage, RequestStage::Processing { .. })
    }

    /// Token of the running download, if any
    #[must_use]
    pub fn cancel_token(&self) -> Option<&CancellationToken> {
        match &self.stage {
            RequestStage::Processing { cancel, .. } => Some(cancel),
            RequestStage::AwaitingSelection => None,
        }
    }

    fn cancel_job(&self) {
        if let Some(token) = self.cancel_token() {
            token.cancel();
        }
    }
}

/// Expires awaiting requests `ttl` after their last write and never
/// expires a running one.
struct StageExpiry {
    ttl: Duration,
}

impl StageExpiry {
    const fn for_request(&self, request: &PendingRequest) -> Option<Duration> {
        if request.is_processing() {
            None
        } else {
            Some(self.ttl)
        }
    }
}

impl Expiry<i64, PendingRequest> for StageExpiry {
    fn expire_after_create(
        &self,
        _user_id: &i64,
        request: &PendingRequest,
        _created_at: Instant,
    ) -> Option<Duration> {
        self.for_request(request)
    }

    fn expire_after_update(
        &self,
        _user_id: &i64,
        request: &PendingRequest,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        self.for_request(request)
    }
}

/// Result of trying to start processing a user's request
#[derive(Debug)]
pub enum Claim {
    /// The request moved to `Processing`; the returned copy carries the token
    Claimed(PendingRequest),
    /// A download is already running for this user
    Busy,
    /// No request for this user (never created, finished, cancelled or expired)
    Missing,
}

/// Store of pending requests keyed by Telegram user ID
#[derive(Clone)]
pub struct SessionStore {
    cache: Cache<i64, PendingRequest>,
}

impl SessionStore {
    /// Creates a store whose awaiting entries expire `ttl` after their last
    /// write. Processing entries stay until finished, cancelled or replaced.
    ///
    /// # Examples
    ///
    /// ```
    /// use media_fetch_bot::session::SessionStore;
    /// use std::time::Duration;
    ///
    /// let store = SessionStore::new(Duration::from_secs(900), 10_000);
    /// ```
    #[must_use]
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(StageExpiry { ttl })
            .eviction_listener(
                |user_id: Arc<i64>, request: PendingRequest, cause: RemovalCause| {
                    if cause.was_evicted() {
                        debug!(user_id = *user_id, cause = ?cause, "Pending request evicted");
                        // Nobody can finish or cancel it anymore
                        request.cancel_job();
                    }
                },
            )
            .build();

        Self { cache }
    }

    /// Stores `request`, replacing the user's previous one.
    ///
    /// A replaced request that was still downloading gets cancelled.
    /// Returns the replaced request.
    pub async fn insert(&self, request: PendingRequest) -> Option<PendingRequest> {
        let user_id = request.user_id;
        let previous = self.cache.get(&user_id).await;
        self.cache.insert(user_id, request).await;

        if let Some(ref prev) = previous {
            if prev.is_processing() {
                debug!(user_id, "New link replaces a running download, cancelling it");
            }
            prev.cancel_job();
        }
        previous
    }

    /// Current request of `user_id`
    pub async fn get(&self, user_id: i64) -> Option<PendingRequest> {
        self.cache.get(&user_id).await
    }

    /// Atomically moves the user's request from awaiting to processing.
    ///
    /// Two rapid presses of the same menu produce one `Claimed` and one `Busy`.
    pub async fn claim(&self, user_id: i64, choice: Choice) -> Claim {
        let result = self
            .cache
            .entry(user_id)
            .and_compute_with(|entry| {
                let op = match entry.map(moka::Entry::into_value) {
                    Some(mut request) if !request.is_processing() => {
                        request.stage = RequestStage::Processing {
                            choice,
                            cancel: CancellationToken::new(),
                        };
                        Op::Put(request)
                    }
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;

        match result {
            CompResult::ReplacedWith(entry) | CompResult::Inserted(entry) => {
                Claim::Claimed(entry.into_value())
            }
            CompResult::Unchanged(_) => Claim::Busy,
            CompResult::StillNone(_) | CompResult::Removed(_) => Claim::Missing,
        }
    }

    /// Removes the user's request, cancelling its download if one is running
    pub async fn cancel(&self, user_id: i64) -> Option<PendingRequest> {
        let removed = self.cache.remove(&user_id).await;
        if let Some(ref request) = removed {
            request.cancel_job();
        }
        removed
    }

    /// Removes the user's request only if it is still `request_id`.
    ///
    /// Returns `true` if something was removed. A finished job never removes
    /// a newer request submitted in the meantime.
    pub async fn finish(&self, user_id: i64, request_id: Uuid) -> bool {
        let result = self
            .cache
            .entry(user_id)
            .and_compute_with(|entry| {
                let op = match entry {
                    Some(entry) if entry.value().id == request_id => Op::Remove,
                    _ => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;

        matches!(result, CompResult::Removed(_))
    }

    /// Number of stored requests (approximate until pending tasks run)
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    /// Applies pending expirations and evictions
    pub async fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks().await;
    }
}
