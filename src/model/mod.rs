pub mod completable;
pub mod config;
pub mod user;

pub use completable::*;
pub use config::*;
pub use user::*;
