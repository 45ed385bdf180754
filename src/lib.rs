//! RefPaint: reference-image annotation and request composition for an
//! image-generation client.
//!
//! Hosts feed pointer events into a slot's [`components::engine::DrawingEngine`],
//! and the [`session::Session`] turns the annotated slots plus a prompt into an
//! outbound request for a [`ops::ai::GenerationApi`].

#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

pub mod logger;

pub mod canvas;
pub mod cli;
pub mod components;
pub mod io;
pub mod ops;
pub mod session;
pub mod settings;

pub use components::engine::DrawingEngine;
pub use components::slots::{SlotError, SlotManager, SlotMode};
pub use ops::ai::{ErrorCategory, GenerationApi, GenerationError};
pub use ops::request::{OutboundRequest, RequestComposer, SizeHint};
pub use session::Session;
