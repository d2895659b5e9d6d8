//! Sharing consent state machine.
//!
//! The stored `SharingStatus` row is only half of the truth: whether a member
//! is live also depends on the current time (temporary sessions elapse) and
//! on the mode (one-time grants are never live). `SharingState::of` derives
//! the effective state and every reader goes through it, so the invariant
//! "expired or one-time => not live" holds even when the sweeper is late.

use std::str::FromStr;
use std::sync::Arc;

use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::db::{
    LocationSample, MemberRepository, SharingMode, SharingStatus, SharingStatusRepository,
};
use crate::error::{AppError, AppResult};
use crate::services::geodesy::Coordinate;
use crate::services::ledger::LocationLedger;
use crate::AppState;

/// Durations accepted by `share`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareDuration {
    FifteenMinutes,
    OneHour,
    OneDay,
    Always,
    OneTime,
}

impl FromStr for ShareDuration {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "15m" => Ok(ShareDuration::FifteenMinutes),
            "1h" => Ok(ShareDuration::OneHour),
            "1d" => Ok(ShareDuration::OneDay),
            "always" => Ok(ShareDuration::Always),
            "one-time" => Ok(ShareDuration::OneTime),
            other => Err(AppError::InvalidDuration(format!(
                "'{}' (expected one of 15m, 1h, 1d, always, one-time)",
                other
            ))),
        }
    }
}

impl ShareDuration {
    pub fn mode(self) -> SharingMode {
        match self {
            ShareDuration::FifteenMinutes | ShareDuration::OneHour | ShareDuration::OneDay => {
                SharingMode::Temporary
            }
            ShareDuration::Always => SharingMode::Always,
            ShareDuration::OneTime => SharingMode::OneTime,
        }
    }

    /// Lifetime of a temporary session.
    pub fn ttl(self) -> Option<Duration> {
        match self {
            ShareDuration::FifteenMinutes => Some(Duration::minutes(15)),
            ShareDuration::OneHour => Some(Duration::hours(1)),
            ShareDuration::OneDay => Some(Duration::days(1)),
            ShareDuration::Always | ShareDuration::OneTime => None,
        }
    }
}

/// Effective sharing state of a member at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharingState {
    /// Never shared, or stopped.
    Inactive,
    /// A one-time grant: produced exactly one sample, never live.
    OneTime,
    TemporaryLive { expires_at: NaiveDateTime },
    /// A temporary session that ran past its expiry without being stopped,
    /// whether or not the stored flag has been cleared yet.
    TemporaryExpired,
    AlwaysLive,
}

impl SharingState {
    pub fn of(status: Option<&SharingStatus>, now: NaiveDateTime) -> Self {
        let Some(status) = status else {
            return SharingState::Inactive;
        };

        match status.mode {
            SharingMode::OneTime => SharingState::OneTime,
            SharingMode::Always if status.is_live => SharingState::AlwaysLive,
            SharingMode::Always => SharingState::Inactive,
            SharingMode::Temporary if status.stopped_at.is_some() => SharingState::Inactive,
            SharingMode::Temporary => match status.expires_at {
                Some(expires_at) if now <= expires_at => {
                    if status.is_live {
                        SharingState::TemporaryLive { expires_at }
                    } else {
                        SharingState::Inactive
                    }
                }
                // A temporary session without an expiry cannot be honoured.
                _ => SharingState::TemporaryExpired,
            },
        }
    }

    pub fn is_live(self) -> bool {
        matches!(
            self,
            SharingState::TemporaryLive { .. } | SharingState::AlwaysLive
        )
    }

    /// The session has elapsed but the stored row still says live.
    pub fn needs_expiry(self, status: &SharingStatus) -> bool {
        matches!(self, SharingState::TemporaryExpired) && status.is_live
    }
}

/// Externally visible, normalized sharing status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SharingStatusView {
    pub is_sharing_live: bool,
    pub sharing_type: Option<SharingMode>,
    pub expires_at: Option<NaiveDateTime>,
    pub started_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

impl SharingStatusView {
    pub fn normalized(status: Option<&SharingStatus>, now: NaiveDateTime) -> Self {
        let state = SharingState::of(status, now);
        match status {
            Some(s) => Self {
                is_sharing_live: state.is_live(),
                sharing_type: Some(s.mode),
                expires_at: s.expires_at,
                started_at: Some(s.started_at),
                updated_at: Some(s.updated_at),
            },
            None => Self {
                is_sharing_live: false,
                sharing_type: None,
                expires_at: None,
                started_at: None,
                updated_at: None,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ShareOutcome {
    pub status: SharingStatusView,
    /// The single sample recorded by a one-time share.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationSample>,
}

#[derive(Debug, Serialize)]
pub struct StopOutcome {
    pub status: SharingStatusView,
    /// The member was not live before this call.
    pub already_stopped: bool,
}

pub struct SharingService;

impl SharingService {
    /// Start a sharing session.
    ///
    /// Temporary and always-on sessions become live immediately. A one-time
    /// share records exactly one sample and leaves the member not live; the
    /// status change and the sample are written in one transaction.
    pub async fn share(
        state: &Arc<AppState>,
        user_id: &str,
        duration: ShareDuration,
        position: Option<Coordinate>,
        accuracy: Option<f64>,
    ) -> AppResult<ShareOutcome> {
        Self::ensure_subject(state, user_id).await?;
        let now = state.clock.now();
        let mode = duration.mode();

        if mode == SharingMode::OneTime {
            let coordinate = position.ok_or_else(|| {
                AppError::BadRequest(
                    "latitude and longitude are required for one-time sharing".to_string(),
                )
            })?;

            let mut tx = state.db.begin().await?;
            let status = SharingStatusRepository::start_session(
                &mut *tx,
                user_id,
                SharingMode::OneTime,
                false,
                None,
                now,
            )
            .await?;
            let sample = LocationLedger::append(&mut *tx, user_id, coordinate, accuracy, now).await?;
            tx.commit().await?;

            tracing::debug!("User {} shared a one-time location {}", user_id, sample.id);
            return Ok(ShareOutcome {
                status: SharingStatusView::normalized(Some(&status), now),
                location: Some(sample),
            });
        }

        let expires_at = duration.ttl().map(|ttl| now + ttl);
        let status =
            SharingStatusRepository::start_session(&state.db, user_id, mode, true, expires_at, now)
                .await?;

        tracing::debug!(
            "User {} started {:?} sharing (expires_at: {:?})",
            user_id,
            mode,
            expires_at
        );
        Ok(ShareOutcome {
            status: SharingStatusView::normalized(Some(&status), now),
            location: None,
        })
    }

    /// Record a position for a live session.
    ///
    /// Fails with `SharingExpired` (after closing the session) when a
    /// temporary session has elapsed, and with `SharingNotActive` for
    /// inactive or one-time members.
    pub async fn update(
        state: &Arc<AppState>,
        user_id: &str,
        position: Coordinate,
        accuracy: Option<f64>,
    ) -> AppResult<LocationSample> {
        let now = state.clock.now();

        let mut tx = state.db.begin().await?;
        if let Some(sample) =
            LocationLedger::append_while_sharing(&mut *tx, user_id, position, accuracy, now).await?
        {
            tx.commit().await?;
            return Ok(sample);
        }

        // Rejected by the guard: find out why from the same snapshot.
        let status = SharingStatusRepository::find_by_user(&mut *tx, user_id).await?;
        tx.rollback().await?;

        if status.is_none() {
            Self::ensure_subject(state, user_id).await?;
        }

        let sharing = SharingState::of(status.as_ref(), now);
        if sharing == SharingState::TemporaryExpired {
            if let Some(s) = status.as_ref().filter(|s| sharing.needs_expiry(s)) {
                if SharingStatusRepository::expire_if_elapsed(&state.db, &s.user_id, now).await? {
                    tracing::debug!("Expired temporary sharing of user {} on update", user_id);
                }
            }
            return Err(AppError::SharingExpired);
        }

        tracing::debug!(
            "Rejected location update from user {} in state {:?}",
            user_id,
            sharing
        );
        Err(AppError::SharingNotActive)
    }

    /// Stop sharing. Idempotent: stopping twice reports `already_stopped`.
    pub async fn stop(state: &Arc<AppState>, user_id: &str) -> AppResult<StopOutcome> {
        let now = state.clock.now();

        let before = SharingStatusRepository::find_by_user(&state.db, user_id).await?;
        if before.is_none() {
            Self::ensure_subject(state, user_id).await?;
        }
        let was_live = SharingState::of(before.as_ref(), now).is_live();

        let after = match before {
            Some(_) => SharingStatusRepository::stop(&state.db, user_id, now).await?,
            None => None,
        };

        tracing::debug!("User {} stopped sharing (was live: {})", user_id, was_live);
        Ok(StopOutcome {
            status: SharingStatusView::normalized(after.as_ref(), now),
            already_stopped: !was_live,
        })
    }

    async fn ensure_subject(state: &Arc<AppState>, user_id: &str) -> AppResult<()> {
        match MemberRepository::find_by_id(&state.db, user_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::SubjectNotFound(user_id.to_string())),
        }
    }

    /// The member's own normalized status.
    pub async fn status(state: &Arc<AppState>, user_id: &str) -> AppResult<SharingStatusView> {
        let now = state.clock.now();
        let status = SharingStatusRepository::find_by_user(&state.db, user_id).await?;
        Ok(Self::observe(state, status.as_ref(), now).await)
    }

    /// Normalize a status that was just read, persisting the expiry if the
    /// read is the first to notice that a temporary session elapsed.
    ///
    /// The eager write is a best-effort CAS; if it fails the view is still
    /// correct and the sweeper will converge the row.
    pub async fn observe(
        state: &Arc<AppState>,
        status: Option<&SharingStatus>,
        now: NaiveDateTime,
    ) -> SharingStatusView {
        if let Some(s) = status {
            if SharingState::of(Some(s), now).needs_expiry(s) {
                match SharingStatusRepository::expire_if_elapsed(&state.db, &s.user_id, now).await
                {
                    Ok(true) => {
                        tracing::debug!("Expired temporary sharing of user {} on read", s.user_id)
                    }
                    Ok(false) => {}
                    Err(e) => tracing::warn!(
                        "Failed to persist expiry for user {}: {:?}",
                        s.user_id,
                        e
                    ),
                }
            }
        }

        SharingStatusView::normalized(status, now)
    }
}
