pub mod auth;
pub mod geofences;
pub mod health;
pub mod locations;
