// Library root: configuration, source assembly and delivery for the
// `kinenbi` binary, exposed for integration tests.

pub mod app;
pub mod config;
pub mod delivery;
pub mod sources;
