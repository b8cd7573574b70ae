pub mod admin;
pub mod commands;
pub mod cron;
pub mod health;
