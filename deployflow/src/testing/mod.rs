//! Test doubles for deployflow pipelines.
//!
//! This module provides:
//! - A stage whose contract and behaviour are scripted
//! - An apply engine that returns canned outputs and records calls
//! - A health probe that replays scripted responses
//! - A version source that counts queries

mod doubles;
mod engine;
mod stage;

pub use doubles::{StaticVersionSource, StubProbe};
pub use engine::ScriptedApplyEngine;
pub use stage::ScriptedStage;
