pub mod callbacks;
pub mod fixtures;
#[cfg(feature = "sqlite")]
pub mod prepare_env;
