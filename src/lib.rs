//! # Vocab Sync
//!
//! Incremental sync of annotated vocabulary from workspace context pages
//! into word and expression databases.
//!
//! Context pages are walked depth-first. Every list item whose first
//! **_bold italic_** run is non-empty becomes a unit. Each unit is resolved
//! to exactly one entry in the words database (single token) or the
//! expressions database (contains whitespace), created on first sight and
//! optionally enriched from a dictionary. The entry then receives a link
//! back to the block the unit came from.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//! │ Contexts │──▶│  Walker  │──▶│ Resolver │──▶│  Commit  │
//! │  query   │   │ + stale  │   │ + lexicon│   │ markers  │
//! └──────────┘   └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`traits`] | Workspace and lexicon seams |
//! | [`connector_notion`] | Notion REST client |
//! | [`memory`] | In-memory workspace for tests |
//! | [`walker`] | Traversal and unit extraction |
//! | [`sync_state`] | Minute-granularity staleness markers |
//! | [`lexicon`] | Dictionary lookup and audio URLs |
//! | [`blocks`] | Content blocks for entry pages |
//! | [`resolver`] | Entry lookup, creation, cross-references |
//! | [`ingest`] | Run orchestration |

pub mod blocks;
pub mod config;
pub mod connector_notion;
pub mod contexts;
pub mod error;
pub mod ingest;
pub mod lexicon;
pub mod lookup_cmd;
pub mod memory;
pub mod models;
pub mod resolver;
pub mod sync_state;
pub mod traits;
pub mod walker;
