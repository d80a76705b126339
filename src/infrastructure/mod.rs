pub mod music;
pub mod repositories;
pub mod rpc;
pub mod schema;
pub mod timefmt;
pub mod topology;
