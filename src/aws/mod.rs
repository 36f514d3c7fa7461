//! AWS client layer
//!
//! EC2 wrappers for the backup manager:
//! - context: shared SDK configuration
//! - ec2: the provider surface behind the `Ec2Backup` trait
//! - error: error-code classification for idempotent deletes

pub mod context;
pub mod ec2;
pub mod error;

pub use context::AwsContext;
pub use ec2::{Ec2Backup, Ec2Client};
pub use error::{ignore_not_found, is_not_found};
