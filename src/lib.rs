//! History-reconstruction core: turns a set of per-file RCS/CVS-style
//! revision timelines into a coherent commit graph, ready for translation
//! into a fast-import-style byte stream.
//!
//! This crate implements only the core described in spec.md §1: changeset
//! clustering ([`changeset`]), the branch-dependency graph and its cycle
//! breaking ([`branch`]), tag-point assignment ([`tagpoint`]), the
//! heap-based emission scheduler and its cycle splitting ([`emission`]),
//! fix-up generation ([`fixup`]), and the in-memory database that binds
//! these together ([`database`]). The legacy-server transport, the RCS/CVS
//! log parser, and the fast-import byte writer are external collaborators;
//! this crate only defines the trait boundaries they meet ([`interfaces`]).
//!
//! A typical driver, once a [`database::Database`] has been populated by a
//! parser collaborator:
//!
//! ```
//! use histgraph_core::config::Config;
//! use histgraph_core::database::Database;
//! use histgraph_core::{branch, emission, tagpoint};
//!
//! let mut db = Database::new();
//! let config = Config::default();
//!
//! db.resolve()?;
//! db.cluster_changesets(&config);
//! db.init_branch_tips();
//! let release_order = branch::analyse(&mut db)?;
//! tagpoint::assign(&mut db, &release_order, &config)?;
//! let plan = emission::run(&mut db, &config)?;
//! assert!(plan.order.is_empty()); // nothing was parsed into `db` above
//! # Ok::<(), histgraph_core::error::CoreError>(())
//! ```
//!
//! Fix-up commits (component G) are generated per tag as the caller walks
//! [`emission::EmissionPlan::order`] and reaches each tag's changeset; see
//! [`fixup::create_fixups`] and [`fixup::FixupQueue`].
//!
//! The arena-with-indices design (every inter-entity reference is a `Copy`
//! newtype index into a `Vec` owned by [`database::Database`]) reproduces
//! the original tool's intrusive pointer cycles (version -> branch -> tag ->
//! changeset -> version) without `unsafe`, per the Design Notes in
//! `SPEC_FULL.md`.

#![forbid(unsafe_code)]

pub mod branch;
pub mod changeset;
pub mod config;
pub mod database;
pub mod dotted;
pub mod emission;
pub mod error;
pub mod file;
pub mod fixup;
pub mod heap;
pub mod ids;
pub mod interfaces;
pub mod interner;
pub mod tag;
pub mod tagpoint;
pub mod time;

#[cfg(any(test, feature = "testing"))]
pub mod testutil;
