pub mod conversations;
pub mod matches;
pub mod notifications;
pub mod reports;

/// Configures the web app by adding services from each web file.
pub fn configure(conf: &mut actix_web::web::ServiceConfig) {
    // Descending order. Route resolution stops at the first match.
    reports::configure(conf);
    matches::configure(conf);
    notifications::configure(conf);
    conversations::configure(conf);
}
