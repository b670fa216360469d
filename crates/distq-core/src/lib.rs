pub mod config;
pub mod token;

pub use config::{DistqConfig, StoreBackend, StoreConfig};
pub use token::{TOKEN_LEN, random_token};
