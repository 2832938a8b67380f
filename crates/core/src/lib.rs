//! # FractalBot Core
//!
//! Domain types, traits, and error definitions for the FractalBot
//! conversational assistant. This crate has **no framework dependencies**:
//! it defines the model that the provider, tool, agent and gateway crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! Every seam (language backend, tool) is a trait here. Implementations live
//! in their respective crates, so tests can swap in scripted backends and
//! stub tools without touching the loop.

pub mod asset;
pub mod error;
pub mod job;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use asset::{Asset, AssetMetadata, AssetStatus, DataType, FileType};
pub use error::{Error, ProtocolError, ProviderError, Result, ToolError};
pub use job::{AgentJob, AgentType, JobMetadata, OutputAssetConfig};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition, Usage};
pub use tool::{Tool, ToolCall, ToolRegistry};
