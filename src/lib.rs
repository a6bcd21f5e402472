pub mod app;
pub mod canonicals;
pub mod config;
pub mod convert;
pub mod create;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod output;
pub mod parser;
pub mod pool;
pub mod sink;
pub mod store;
pub mod words;
