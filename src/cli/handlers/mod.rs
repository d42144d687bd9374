pub mod clean;
pub mod commons;
pub mod init;
pub mod install;
pub mod run;
pub mod tool;
pub mod update;
