//! Infection-control record tracker core for skilled nursing facilities.
//!
//! The interesting part of this crate is the ingestion-and-reconciliation
//! pipeline: pasted census reports, bulk paste tables, and legacy JSON dumps
//! all arrive as inconsistently formatted text and must converge on one
//! canonical, deduplicated, identity-stable record store. Rendering, export
//! formatting, and the physical storage medium live outside this crate; the
//! persisted snapshot is reached only through the [`store::StateStore`]
//! trait.

pub mod config;
pub mod models;
pub mod store;
pub mod pipeline;
pub mod rules;
