pub mod auth;
pub mod family_locations;
pub mod geodesy;
pub mod geofence;
pub mod init;
pub mod ledger;
pub mod privacy;
pub mod sharing;
pub mod sweeper;
