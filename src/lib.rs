mod database {
    pub mod actions;
    pub mod catalog;
    pub mod error;
    pub mod form;
    pub mod media;
    pub mod schema;
    pub mod setup;
    pub mod validation;
}
mod authentication {
    pub mod cryptography;
    pub mod jwt;
    pub mod middleware;
    pub mod permissions;
}
mod config;
mod constants;
mod report;

mod cache {
    pub mod cache;
}

pub use authentication::*;
pub use cache::cache::*;
pub use config::*;
pub use constants::*;
pub use database::*;
pub use report::*;
