pub mod archive;
pub mod csv;
pub mod importer;
pub mod init;
pub mod notifications;
pub mod push;
pub mod reminders;
pub mod sweep;
