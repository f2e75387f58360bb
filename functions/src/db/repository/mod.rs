pub mod catalog;
pub mod event;
pub mod notification;
pub mod user_profile;

pub use catalog::{CategoryRepository, ClientRepository};
pub use event::EventRepository;
pub use notification::NotificationRepository;
pub use user_profile::UserProfileRepository;
