//! conceptmap - concept-map extraction and force-directed layout for chat replies.
//!
//! Text goes through the [`extractor`] into a [`model::ConceptGraph`], gets seed
//! positions from [`layout`], and is animated by a [`simulation::ForceSimulation`].
//! A [`session::GraphSession`] ties these together with pointer interaction
//! for hosts that drive it one frame at a time.

pub mod config;
pub mod extractor;
pub mod interaction;
pub mod io;
pub mod layout;
pub mod model;
pub mod session;
pub mod simulation;
pub mod style;
pub mod svg_writer;
