pub mod agent;
pub mod config_cmd;
pub mod insights;
