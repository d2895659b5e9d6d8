pub mod child_profile;
pub mod family;
pub mod geofence;
pub mod location_sample;
pub mod member;
pub mod sharing_status;

pub use child_profile::ChildProfileRepository;
pub use family::FamilyRepository;
pub use geofence::GeofenceRepository;
pub use location_sample::LocationSampleRepository;
pub use member::MemberRepository;
pub use sharing_status::SharingStatusRepository;
