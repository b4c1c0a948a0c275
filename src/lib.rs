pub mod config;
pub mod inference;
pub mod labels;
pub mod model;
pub mod preprocess;
pub mod server;
pub mod upload;
pub mod utils;
