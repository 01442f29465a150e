//! Conversational bot unit: dialog versioning and the typestate build
//! pipeline that compiles a locale into a published alias.

pub mod pipeline;
pub mod version;

pub use pipeline::{build_bot_unit, BotPipeline, BotStage, BotUnitSpec};
pub use version::{AliasHistory, VersionStore};
