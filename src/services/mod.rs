pub mod broker;
pub mod cache;
pub mod parser;
pub mod provider;
