pub mod channels;
pub mod config;
pub mod constants;
pub mod emit;
pub mod enrich;
pub mod error;
pub mod fetch;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod providers;
pub mod types;
