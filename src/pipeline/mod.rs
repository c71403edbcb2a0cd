//! Pipeline stages for a harvest run.
//!
//! Each submodule implements exactly one step, so each can be tested alone
//! and the browser or HTTP backend can change without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! source ──▶ normalize ──▶ ┬─ download ─┬─▶ backoff
//! (search)   (dedupe)      └─ render ───┘   (cooldown?)
//!                              │
//!                            store (exists? / atomic write)
//! ```
//!
//! 1. [`source`]   : one search request, raw identifier list (duplicates kept)
//! 2. [`normalize`]: identifier validation and first-seen deduplication
//! 3. [`store`]    : artifact paths; presence is the completion record
//! 4. [`download`] : direct PDF fetch with status, type and size validation
//! 5. [`render`]   : browser capture gated on observed status and body text
//! 6. [`backoff`]  : fixed cooldown decision after each attempt

pub mod backoff;
pub mod download;
pub mod normalize;
pub mod render;
pub mod source;
pub mod store;
