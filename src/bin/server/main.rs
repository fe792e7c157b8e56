use actix_session::{config::PersistentSession, storage::CookieSessionStore, SessionMiddleware};
use actix_web::cookie::{Key, SameSite};
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use chrono::Utc;
use env_logger::Env;
use rand::{distributions::Alphanumeric, Rng};
use reclaim::app_config;
use reclaim::db::init_db;
use reclaim::matching::{self, ScanCancel};
use reclaim::notifications;
use std::time::Duration;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    init_db(std::env::var("DATABASE_URL").expect("DATABASE_URL must be set.")).await;

    let config = app_config::get_config();

    let secret_key = match std::env::var("SECRET_KEY") {
        Ok(key) => Key::from(key.as_bytes()),
        Err(err) => {
            let random_string: String = rand::thread_rng()
                .sample_iter(&Alphanumeric)
                .take(128)
                .map(char::from)
                .collect();
            log::warn!("SECRET_KEY was invalid. Reason: {:?}\r\nSession cookies will invalidate every time the application is restarted. A secret key must be at least 64 bytes to be accepted.", err);
            Key::from(random_string.as_bytes())
        }
    };

    // One process-wide cancel handle, shared between the scheduler and the
    // scan routes so an operator can abort a stuck sweep.
    let scan_cancel = ScanCancel::new();

    // Periodic matching scan
    let scan_period = Duration::from_secs(config.matching.scan_period_secs);
    let scheduler_cancel = scan_cancel.clone();
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(scan_period);
        interval.tick().await; // First tick fires immediately; skip it
        loop {
            interval.tick().await;
            scheduler_cancel.reset();
            match matching::run_scan(Utc::now().naive_utc(), &scheduler_cancel).await {
                Ok(result) => log::info!(
                    "Matching scan complete: {} new matches, {} notifications",
                    result.new_matches,
                    result.notifications_sent
                ),
                Err(e) => log::error!("Matching scan failed: {}", e),
            }
        }
    });

    // Notification retention pruning, kept off the dispatch path
    let prune_period = Duration::from_secs(config.notifications.prune_period_secs);
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(prune_period);
        interval.tick().await;
        loop {
            interval.tick().await;
            if let Err(e) = notifications::prune_expired(Utc::now().naive_utc()).await {
                log::error!("Notification pruning failed: {}", e);
            }
        }
    });

    let bind = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    log::info!("Starting {} on {}", config.site.name, bind);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(scan_cancel.clone()))
            .wrap(
                SessionMiddleware::builder(CookieSessionStore::default(), secret_key.clone())
                    .cookie_same_site(SameSite::Lax)
                    .session_lifecycle(PersistentSession::default())
                    .build(),
            )
            .wrap(Logger::default())
            .configure(reclaim::web::configure)
    })
    .bind(bind)?
    .run()
    .await
}
