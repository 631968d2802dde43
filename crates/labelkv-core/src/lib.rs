pub mod config;
pub mod error;
pub mod id;
pub mod index;
pub mod kv;
pub mod labels;
#[cfg(test)]
mod test_util;

pub use config::LabelServiceConfig;
pub use error::{CoreError, ErrorCode};
pub use id::Id;
pub use labels::LabelService;
