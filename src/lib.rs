pub mod annotation;
pub mod app;
pub mod assemble;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod hierarchy;
pub mod output;
pub mod rest;
pub mod schema;
pub mod transform;
