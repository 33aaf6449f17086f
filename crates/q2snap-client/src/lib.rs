#![allow(clippy::too_many_arguments, clippy::collapsible_if, clippy::collapsible_else_if,
         clippy::field_reassign_with_default, clippy::manual_range_contains,
         clippy::comparison_chain, clippy::float_cmp, clippy::needless_range_loop,
         clippy::len_without_is_empty)]
// Client side of the network protocol: turns server messages into frames
pub mod client;
pub mod cl_ring;
pub mod cl_delta;
pub mod cl_ents;
pub mod cl_parse;
pub mod cl_tent;
pub mod cl_demo;
pub mod cl_main;
pub mod error;

#[cfg(test)]
mod test_support;

pub use cl_main::{ClientConfig, ClientProtocolState};
pub use client::{ClientCallbacks, NullCallbacks};
pub use error::{ParseError, ParseResult};
