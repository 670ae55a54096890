//! Correlates a code-review conversation with the diff it produced.
//!
//! A mapping reference is located in the conversation text, retrieved (and
//! decrypted when keyed), indexed, and projected onto the review document as
//! anchors and connectors.

pub mod anchor;
pub mod cache;
pub mod crypto;
pub mod db;
pub mod discovery;
pub mod document;
pub mod error;
pub mod index;
pub mod locator;
pub mod memdoc;
pub mod overlay;
pub mod pipeline;
pub mod retrieve;
pub mod schema;
pub mod types;
