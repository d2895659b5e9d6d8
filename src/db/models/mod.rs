//! Database models, one file per table.
//! Everything is re-exported at `crate::db::models` (and `crate::db`).

pub mod child_profile;
pub mod family;
pub mod geofence;
pub mod location_sample;
pub mod member;
pub mod sharing_status;

pub use self::child_profile::*;
pub use self::family::*;
pub use self::geofence::*;
pub use self::location_sample::*;
pub use self::member::*;
pub use self::sharing_status::*;
