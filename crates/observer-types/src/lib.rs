#![forbid(unsafe_code)]

//! **observer-types** – wire types for the privacy-pool state observer.
//!
//! This crate owns the data model shared by every stage of the pipeline:
//! the raw on-chain [`Event`], the decoded [`StateTransitionEvent`], the
//! [`State`] unit the pipeline transports, the content-addressed [`Record`]
//! delta, and the [`Window`] the orchestrator advances. It has no
//! dependency on any other pipeline crate — everything downstream builds
//! on this one.

mod codec;
mod event;
mod poseidon;
mod primitives;
mod record;
mod state;
mod window;

pub use codec::CodecError;
pub use event::Event;
pub use poseidon::{poseidon2, poseidon_hash_bytes, PoseidonError};
pub use primitives::{Address, Hash32};
pub use record::{Record, RecordError};
pub use state::{State, StateError, StateTransitionEvent};
pub use window::{InvalidRange, Window};
