//! Typed rows for the app's collections.

pub mod catalog;
pub mod event;
pub mod notification;
pub mod user_profile;

pub use self::catalog::*;
pub use self::event::*;
pub use self::notification::*;
pub use self::user_profile::*;
