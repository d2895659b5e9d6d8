use std::sync::Arc;

use crate::db::{
    ChildProfileRepository, FamilyRepository, GeofenceRepository, MemberRepository, Role,
    SharingStatusRepository,
};
use crate::error::{AppError, AppResult};
use crate::services::ledger::LocationLedger;
use crate::services::privacy::{LocationEntry, LocationPrivacyProjector, Subject};
use crate::services::sharing::{SharingService, SharingStatusView};
use crate::AppState;

pub struct FamilyLocationAggregator;

impl FamilyLocationAggregator {
    /// Everyone in the family with their latest (possibly redacted) location.
    ///
    /// Members come first, then child profiles, each group in name order.
    /// Child login accounts are only reported through their profile. The only
    /// write is eager expiry of sessions found elapsed during the read.
    pub async fn snapshot(state: &Arc<AppState>, family_id: &str) -> AppResult<Vec<LocationEntry>> {
        FamilyRepository::find_by_id(&state.db, family_id)
            .await?
            .ok_or_else(|| AppError::FamilyNotFound(family_id.to_string()))?;

        let now = state.clock.now();
        let members = MemberRepository::list_by_family(&state.db, family_id).await?;
        let profiles = ChildProfileRepository::list_by_family(&state.db, family_id).await?;
        let fences = GeofenceRepository::list_by_family(&state.db, family_id).await?;

        let subjects = members
            .iter()
            .filter(|m| m.role != Role::ChildUser)
            .map(Subject::from_member)
            .chain(profiles.iter().map(Subject::from_child_profile));

        let mut entries = Vec::with_capacity(members.len() + profiles.len());
        for subject in subjects {
            let (latest, sharing) = match subject.tracked_user_id.as_deref() {
                Some(user_id) => {
                    let latest = LocationLedger::latest(&state.db, user_id).await?;
                    let status = SharingStatusRepository::find_by_user(&state.db, user_id).await?;
                    let sharing = SharingService::observe(state, status.as_ref(), now).await;
                    (latest, sharing)
                }
                None => (None, SharingStatusView::normalized(None, now)),
            };

            entries.push(LocationPrivacyProjector::project(
                &subject,
                latest.as_ref(),
                sharing,
                &fences,
                now,
            ));
        }

        tracing::debug!(
            "Built location snapshot for family {} ({} entries)",
            family_id,
            entries.len()
        );
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::clock::ManualClock;
    use crate::services::geodesy::Coordinate;
    use crate::services::geofence::GeofenceService;
    use crate::services::privacy::SubjectKind;
    use crate::services::sharing::ShareDuration;
    use crate::test_support;

    #[tokio::test]
    async fn unknown_family_is_an_error() {
        let state = test_support::test_state(ManualClock::at_noon()).await;
        let res = FamilyLocationAggregator::snapshot(&state, "nope").await;
        assert!(matches!(res, Err(AppError::FamilyNotFound(_))));
    }

    #[tokio::test]
    async fn child_with_login_is_listed_once_via_profile() {
        let state = test_support::test_state(ManualClock::at_noon()).await;
        let family = test_support::insert_family(&state.db, "Smiths").await;
        let anna = test_support::insert_member(&state.db, &family, "Anna", Role::Parent).await;
        let tim_login =
            test_support::insert_member(&state.db, &family, "Tim", Role::ChildUser).await;
        let tim = test_support::insert_child_profile(
            &state.db,
            &family,
            "Tim",
            &anna.id,
            Some(&tim_login.id),
        )
        .await;
        let lia =
            test_support::insert_child_profile(&state.db, &family, "Lia", &anna.id, None).await;

        SharingService::share(&state, &tim_login.id, ShareDuration::Always, None, None)
            .await
            .unwrap();
        SharingService::update(
            &state,
            &tim_login.id,
            Coordinate::new(48.1351, 11.582).unwrap(),
            Some(12.0),
        )
        .await
        .unwrap();

        let entries = FamilyLocationAggregator::snapshot(&state, &family).await.unwrap();
        assert_eq!(entries.len(), 3);

        assert_eq!(entries[0].user_id, anna.id);
        assert_eq!(entries[0].subject_type, SubjectKind::Member);
        assert!(!entries[0].sharing.is_sharing_live);

        // Profiles in name order: Lia, then Tim.
        assert_eq!(entries[1].user_id, lia.id);
        assert_eq!(entries[1].subject_type, SubjectKind::ChildProfile);
        assert!(entries[1].latitude.is_none());
        assert!(entries[1].sharing.sharing_type.is_none());

        // Reported under the profile id, with the login account's data.
        assert_eq!(entries[2].user_id, tim.id);
        assert_eq!(entries[2].subject_type, SubjectKind::ChildProfile);
        assert_eq!(entries[2].latitude, Some(48.1351));
        assert_eq!(entries[2].accuracy, Some(12.0));
        assert!(entries[2].sharing.is_sharing_live);

        assert_eq!(entries.iter().filter(|e| e.user_id == tim.id).count(), 1);
        assert!(entries.iter().all(|e| e.user_id != tim_login.id));
    }

    #[tokio::test]
    async fn member_inside_fence_is_reported_by_label() {
        let state = test_support::test_state(ManualClock::at_noon()).await;
        let family = test_support::insert_family(&state.db, "Smiths").await;
        let anna = test_support::insert_member(&state.db, &family, "Anna", Role::Parent).await;

        let home = GeofenceService::create(&state, &anna, "Home", Coordinate::new(50.11, 8.68).unwrap())
            .await
            .unwrap();
        SharingService::share(&state, &anna.id, ShareDuration::OneHour, None, None)
            .await
            .unwrap();
        SharingService::update(&state, &anna.id, Coordinate::new(50.1101, 8.6801).unwrap(), Some(5.0))
            .await
            .unwrap();

        let entries = FamilyLocationAggregator::snapshot(&state, &family).await.unwrap();
        let entry = &entries[0];
        assert!(entry.within_geofence);
        assert_eq!(entry.geofence_id.as_deref(), Some(home.id.as_str()));
        assert_eq!(entry.location_label.as_deref(), Some("Home"));
        assert!(entry.latitude.is_none());
        assert!(entry.accuracy.is_none());
        assert!(entry.timestamp.is_some());
    }

    #[tokio::test]
    async fn snapshot_normalizes_and_persists_expiry() {
        let clock = Arc::new(ManualClock::at_noon());
        let state = test_support::test_state_with_clock(clock.clone()).await;
        let family = test_support::insert_family(&state.db, "Smiths").await;
        let anna = test_support::insert_member(&state.db, &family, "Anna", Role::Parent).await;

        SharingService::share(&state, &anna.id, ShareDuration::FifteenMinutes, None, None)
            .await
            .unwrap();
        SharingService::update(&state, &anna.id, Coordinate::new(48.0, 11.0).unwrap(), None)
            .await
            .unwrap();

        let entries = FamilyLocationAggregator::snapshot(&state, &family).await.unwrap();
        assert!(entries[0].sharing.is_sharing_live);
        assert!(!entries[0].is_stale);

        clock.advance(Duration::minutes(16));
        let entries = FamilyLocationAggregator::snapshot(&state, &family).await.unwrap();
        assert!(!entries[0].sharing.is_sharing_live);
        assert!(entries[0].is_stale);
        // Last known position is still shown.
        assert_eq!(entries[0].latitude, Some(48.0));

        let stored = SharingStatusRepository::find_by_user(&state.db, &anna.id)
            .await
            .unwrap()
            .unwrap();
        assert!(!stored.is_live);
    }

    #[tokio::test]
    async fn snapshot_order_is_stable() {
        let state = test_support::test_state(ManualClock::at_noon()).await;
        let family = test_support::insert_family(&state.db, "Smiths").await;
        for name in ["Zoe", "Anna", "Mia"] {
            test_support::insert_member(&state.db, &family, name, Role::Parent).await;
        }

        let first: Vec<String> = FamilyLocationAggregator::snapshot(&state, &family)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.user_name)
            .collect();
        let second: Vec<String> = FamilyLocationAggregator::snapshot(&state, &family)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.user_name)
            .collect();

        assert_eq!(first, vec!["Anna", "Mia", "Zoe"]);
        assert_eq!(first, second);
    }
}
