//! Tool-call surface over the client.
//!
//! - [`core`]: [`ToolDef`], [`ToolDescriptor`], [`ToolRegistry`] (lookup,
//!   schema validation, dispatch) and the [`ToolError`] / [`ToolResponse`]
//!   wire shapes.
//! - [`spec`]: [`ToolSpec`](spec::ToolSpec) builder for descriptions with
//!   `when_to_use` / `when_not_to_use` guidance.
//! - [`transit`]: the `mbta_*` catalogue; build it with [`transit_tools`].

pub mod core;
pub mod spec;
pub mod transit;

pub use core::{
    ContentBlock, ToolDef, ToolDescriptor, ToolError, ToolFuture, ToolRegistry, ToolResponse,
};
pub use spec::ToolSpec;
pub use transit::transit_tools;
