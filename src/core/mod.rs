pub mod collection;
pub mod config_loader;
pub mod export;
pub mod filter;
pub mod paths;
pub mod pipeline;
pub mod remote;
