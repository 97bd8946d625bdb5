//! A caching DNS forwarder: answers UDP queries from a TTL-aware cache and
//! forwards misses to a single upstream resolver.

pub mod config;
pub mod dns_cache;
pub mod dns_hdr;
pub mod dns_msg;
pub mod dns_name;
pub mod dns_server;
pub mod error;
pub mod resolver;
