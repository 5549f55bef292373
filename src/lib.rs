pub mod blurb;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod error;
pub mod harvest;
pub mod marc;
pub mod output;
pub mod resolver;
pub mod store;
