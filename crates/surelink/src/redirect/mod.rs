//! Redirection: short code creation and read-through resolution.

mod hosts;
mod resolver;

pub use hosts::{DnsHostValidator, HostValidator, HostValidityCache};
pub use resolver::{RedirectionConfig, RedirectionService};

#[cfg(test)]
pub(crate) use hosts::test_support;
