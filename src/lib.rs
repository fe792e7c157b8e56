pub mod app_config;
pub mod conversations;
pub mod db;
pub mod events;
pub mod matching;
pub mod middleware;
pub mod moderation;
pub mod notifications;
pub mod orm;
pub mod web;
