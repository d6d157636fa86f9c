pub mod host;
pub mod remove;
