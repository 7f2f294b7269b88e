//! # memwindow Core
//!
//! Domain types shared by every memwindow crate: the candidate records a
//! memory store hands in, the scored items a selection produces, and the
//! result/metrics/exclusion types callers consume.
//!
//! This crate has **no logic beyond construction and (de)serialization**.
//! Scoring, budgeting and packing live in `memwindow-selector`; the budget
//! configuration lives in `memwindow-config`.

pub mod item;
pub mod selection;

// Re-export key types at crate root for ergonomics
pub use item::{CandidateItem, ContextItem, TopicFingerprint};
pub use selection::{
    CallMetadata, DomainUsage, ExclusionReason, ExclusionRecord, Metrics, SelectionResult,
};
