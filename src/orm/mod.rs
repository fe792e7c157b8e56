pub mod conversations;
pub mod matches;
pub mod messages;
pub mod notifications;
pub mod reports;
pub mod users;
