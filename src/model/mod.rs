//! Generator components.
//!
//! `conditioning` turns text embeddings into latent codes, `stage_one` and
//! `stage_two` decode them at increasing resolution, and `stackgan` chains
//! both stages behind a single interface.

pub mod blocks;
pub mod conditioning;
pub mod stackgan;
pub mod stage_one;
pub mod stage_two;
