pub mod access;
pub mod authz;
pub mod config;
pub mod error;
pub mod files;
pub mod paths;
pub mod search;
pub mod server;
pub mod session;
pub mod visibility;
