use chrono::{Duration, NaiveDateTime};
use serde::Serialize;

use crate::db::{ChildProfile, Geofence, LocationSample, Member};
use crate::services::geodesy::Coordinate;
use crate::services::geofence::match_geofence;
use crate::services::sharing::SharingStatusView;

/// A sample older than this at read time is reported as stale.
pub fn stale_after() -> Duration {
    Duration::minutes(5)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Member,
    ChildProfile,
}

/// Someone who appears in the family view.
#[derive(Debug, Clone)]
pub struct Subject {
    /// Reported as `user_id`: the member id, or the child profile id.
    pub id: String,
    pub name: String,
    pub avatar: Option<String>,
    pub color: Option<String>,
    pub kind: SubjectKind,
    /// Account whose samples and sharing status describe this subject.
    pub tracked_user_id: Option<String>,
}

impl Subject {
    pub fn from_member(member: &Member) -> Self {
        Self {
            id: member.id.clone(),
            name: member.display_name(),
            avatar: member.avatar.clone(),
            color: member.color.clone(),
            kind: SubjectKind::Member,
            tracked_user_id: Some(member.id.clone()),
        }
    }

    /// Display fields come from the profile; samples and status from the
    /// linked login account, if any.
    pub fn from_child_profile(profile: &ChildProfile) -> Self {
        Self {
            id: profile.id.clone(),
            name: profile.display_name(),
            avatar: profile.avatar.clone(),
            color: profile.color.clone(),
            kind: SubjectKind::ChildProfile,
            tracked_user_id: profile.linked_user_id.clone(),
        }
    }
}

/// One subject as the family sees it.
///
/// Raw coordinates and a geofence label are mutually exclusive: inside a
/// fence only the label is ever emitted.
#[derive(Debug, Clone, Serialize)]
pub struct LocationEntry {
    pub user_id: String,
    pub user_name: String,
    pub user_avatar: Option<String>,
    pub user_color: Option<String>,
    pub subject_type: SubjectKind,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub accuracy: Option<f64>,
    pub location_label: Option<String>,
    pub geofence_id: Option<String>,
    pub within_geofence: bool,
    pub timestamp: Option<NaiveDateTime>,
    pub is_stale: bool,
    #[serde(flatten)]
    pub sharing: SharingStatusView,
}

pub struct LocationPrivacyProjector;

impl LocationPrivacyProjector {
    pub fn project(
        subject: &Subject,
        latest: Option<&LocationSample>,
        sharing: SharingStatusView,
        fences: &[Geofence],
        now: NaiveDateTime,
    ) -> LocationEntry {
        let is_stale = latest
            .map(|sample| now - sample.recorded_at > stale_after())
            .unwrap_or(false);

        // Stored samples were validated on write; a bad row simply matches nothing.
        let point = latest.and_then(|s| Coordinate::new(s.latitude, s.longitude).ok());
        let fence = match_geofence(point, fences);

        let mut entry = LocationEntry {
            user_id: subject.id.clone(),
            user_name: subject.name.clone(),
            user_avatar: subject.avatar.clone(),
            user_color: subject.color.clone(),
            subject_type: subject.kind,
            latitude: None,
            longitude: None,
            accuracy: None,
            location_label: None,
            geofence_id: None,
            within_geofence: false,
            timestamp: latest.map(|s| s.recorded_at),
            is_stale,
            sharing,
        };

        match (fence, latest) {
            (Some(fence), _) => {
                entry.location_label = Some(fence.name.clone());
                entry.geofence_id = Some(fence.id.clone());
                entry.within_geofence = true;
            }
            (None, Some(sample)) => {
                entry.latitude = Some(sample.latitude);
                entry.longitude = Some(sample.longitude);
                entry.accuracy = sample.accuracy;
            }
            (None, None) => {}
        }

        entry
    }
}
