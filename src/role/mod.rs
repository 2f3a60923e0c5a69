//! Role Resolution
//!
//! Answers "may this node write?" under either leader-election mode and
//! resolves the primary's address for write forwarding.

mod resolver;

pub use resolver::{RoleCheck, RoleResolver};
