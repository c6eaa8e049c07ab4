//! Bundled migrations

pub mod deploy_fuji;

pub use deploy_fuji::DeployFuji;
