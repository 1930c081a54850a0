pub mod config;
pub mod files;
pub mod inspect;
pub mod redis;
mod select;
