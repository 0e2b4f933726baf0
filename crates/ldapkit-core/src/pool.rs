//! Bounded pool of authenticated sessions.
//!
//! Capacity is enforced with a semaphore: every borrowed session holds one permit, so at most
//! `max_sessions` sessions exist outside the idle queue at any time and further borrowers wait
//! (optionally bounded by `acquire_timeout_secs`). Sessions are created lazily on demand; a
//! failed creation only affects the borrower that asked for it.
//!
//! Borrowed sessions are wrapped in a [`PooledSession`] guard that hands the session back when
//! dropped, so release happens on every exit path, including errors, panics and cancelled
//! futures.

use crate::config::PoolConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};
use validator::Validate;

/// Lifecycle hooks the pool uses to manage sessions.
#[cfg_attr(test, mockall::automock(type Session = u32;))]
#[async_trait]
pub trait ManageSession: Send + Sync + 'static {
    /// Session type handed out by the pool.
    type Session: Send + 'static;

    /// Dial and authenticate a new session with the pool's default identity.
    async fn create(&self) -> Result<Self::Session>;

    /// Cheap liveness probe; a session failing it is discarded.
    async fn is_alive(&self, session: &mut Self::Session) -> bool;

    /// Tear a session down.
    async fn close(&self, session: Self::Session);
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Sessions waiting in the idle queue
    pub idle: usize,
    /// Sessions currently borrowed
    pub in_use: usize,
    /// Configured maximum
    pub max_sessions: usize,
}

struct PoolInner<M: ManageSession> {
    manager: M,
    config: PoolConfig,
    idle: Mutex<VecDeque<M::Session>>,
    permits: Arc<Semaphore>,
}

impl<M: ManageSession> PoolInner<M> {
    fn idle(&self) -> MutexGuard<'_, VecDeque<M::Session>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, session: M::Session) {
        if self.permits.is_closed() {
            return;
        }
        self.idle().push_back(session);
    }
}

/// Bounded pool of sessions produced by a [`ManageSession`] implementation.
pub struct SessionPool<M: ManageSession> {
    inner: Arc<PoolInner<M>>,
}

impl<M: ManageSession> Clone for SessionPool<M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<M: ManageSession> SessionPool<M> {
    /// Creates an empty pool. No session is opened until the first borrow or [`warm_up`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationError`] if the configuration is invalid.
    ///
    /// [`warm_up`]: SessionPool::warm_up
    pub fn new(manager: M, config: PoolConfig) -> Result<Self> {
        config.validate()?;
        let permits = Arc::new(Semaphore::new(config.max_sessions));
        Ok(Self {
            inner: Arc::new(PoolInner {
                manager,
                config,
                idle: Mutex::new(VecDeque::new()),
                permits,
            }),
        })
    }

    /// Returns the pool configuration.
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Returns the session manager.
    #[must_use]
    pub fn manager(&self) -> &M {
        &self.inner.manager
    }

    /// Opens sessions until `min_sessions` are idle, never exceeding `max_sessions` counting
    /// borrowed ones.
    ///
    /// Each creation holds a permit, so warming up competes with borrowers for capacity.
    /// Creation failures are logged and swallowed; the pool retries on the next borrow.
    /// Returns the number of sessions opened.
    pub async fn warm_up(&self) -> usize {
        let config = &self.inner.config;
        let mut opened = 0;

        for _ in 0..config.min_sessions {
            let idle = self.inner.idle().len();
            let in_use = self.status().in_use;
            if idle >= config.min_sessions || idle + in_use >= config.max_sessions {
                break;
            }
            let Ok(permit) = Arc::clone(&self.inner.permits).try_acquire_owned() else {
                break;
            };
            match self.inner.manager.create().await {
                Ok(session) => {
                    self.inner.release(session);
                    opened += 1;
                }
                Err(err) => {
                    warn!(error = %err, "failed to pre-open pooled session");
                    break;
                }
            }
            drop(permit);
        }

        debug!(opened, "session pool warmed up");
        opened
    }

    /// Borrows a session, waiting while the pool is at capacity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] when the configured checkout wait elapses,
    /// [`Error::PoolClosed`] after [`close`](SessionPool::close), or the creation error when a
    /// new session could not be established within the retry policy.
    pub async fn get(&self) -> Result<PooledSession<M>> {
        let permit = self.acquire_permit().await?;

        while let Some(mut session) = self.take_idle() {
            if !self.inner.config.test_on_checkout
                || self.inner.manager.is_alive(&mut session).await
            {
                return Ok(PooledSession::new(session, permit, Arc::clone(&self.inner)));
            }
            debug!("discarding pooled session that failed its liveness probe");
            self.inner.manager.close(session).await;
        }

        let session = self.create_session().await?;
        Ok(PooledSession::new(session, permit, Arc::clone(&self.inner)))
    }

    /// Returns current occupancy.
    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let max_sessions = self.inner.config.max_sessions;
        PoolStatus {
            idle: self.inner.idle().len(),
            in_use: max_sessions.saturating_sub(self.inner.permits.available_permits()),
            max_sessions,
        }
    }

    /// Closes the pool: pending and future borrows fail, idle sessions are torn down and
    /// borrowed sessions are closed instead of returned.
    pub async fn close(&self) {
        self.inner.permits.close();
        let drained: Vec<M::Session> = self.inner.idle().drain(..).collect();
        for session in drained {
            self.inner.manager.close(session).await;
        }
    }

    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        let acquire = Arc::clone(&self.inner.permits).acquire_owned();
        let permit = match self.inner.config.acquire_timeout() {
            Some(limit) => timeout(limit, acquire).await.map_err(|_| {
                Error::Timeout(format!(
                    "no pooled session became available within {}s",
                    limit.as_secs()
                ))
            })?,
            None => acquire.await,
        };
        permit.map_err(|_| Error::PoolClosed)
    }

    fn take_idle(&self) -> Option<M::Session> {
        self.inner.idle().pop_front()
    }

    async fn create_session(&self) -> Result<M::Session> {
        let policy = self.inner.config.retry_policy();
        let mut last_error = None;

        for attempt in 0..policy.attempts() {
            let delay = policy.delay_for_attempt(attempt);
            if !delay.is_zero() {
                debug!("Retrying session creation after {:?}", delay);
                sleep(delay).await;
            }

            match self.inner.manager.create().await {
                Ok(session) => {
                    debug!(attempt, "opened pooled session");
                    return Ok(session);
                }
                Err(err) => {
                    warn!(attempt, error = %err, "failed to open pooled session");
                    last_error = Some(err);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| Error::InternalError("session creation never attempted".into())))
    }
}

/// A session borrowed from a [`SessionPool`].
///
/// Dereferences to the underlying session. On drop the session goes back to the idle queue,
/// unless it was marked with [`retire_on_release`](PooledSession::retire_on_release), in which
/// case it is dropped and the pool opens a fresh one on a later borrow.
pub struct PooledSession<M: ManageSession> {
    session: Option<M::Session>,
    retire: AtomicBool,
    pool: Arc<PoolInner<M>>,
    _permit: OwnedSemaphorePermit,
}

impl<M: ManageSession> PooledSession<M> {
    fn new(session: M::Session, permit: OwnedSemaphorePermit, pool: Arc<PoolInner<M>>) -> Self {
        Self {
            session: Some(session),
            retire: AtomicBool::new(false),
            pool,
            _permit: permit,
        }
    }

    /// Marks the session as unfit for reuse until [`keep`](PooledSession::keep) is called.
    pub fn retire_on_release(&self) {
        self.retire.store(true, Ordering::Release);
    }

    /// Clears a previous [`retire_on_release`](PooledSession::retire_on_release).
    pub fn keep(&self) {
        self.retire.store(false, Ordering::Release);
    }

    /// Returns true if the session will be dropped instead of returned.
    #[must_use]
    pub fn is_retiring(&self) -> bool {
        self.retire.load(Ordering::Acquire)
    }
}

impl<M: ManageSession> std::fmt::Debug for PooledSession<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledSession")
            .field("retire", &self.is_retiring())
            .finish_non_exhaustive()
    }
}

impl<M: ManageSession> Deref for PooledSession<M> {
    type Target = M::Session;

    #[allow(clippy::expect_used)]
    fn deref(&self) -> &Self::Target {
        // Only `drop` takes the session.
        self.session.as_ref().expect("pooled session already released")
    }
}

impl<M: ManageSession> DerefMut for PooledSession<M> {
    #[allow(clippy::expect_used)]
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut().expect("pooled session already released")
    }
}

impl<M: ManageSession> Drop for PooledSession<M> {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        if self.is_retiring() {
            debug!("retiring pooled session instead of returning it");
            drop(session);
        } else {
            self.pool.release(session);
        }
    }
}
