//! aft engine - template rendering for packages
//!
//! - [`Engine`]: MiniJinja environment with compose-oriented filters
//! - [`overlay`]: plan and execute the rendering of a package directory tree

pub mod engine;
pub mod error;
pub mod filters;
pub mod overlay;

pub use engine::{Engine, EngineBuilder, TEMPLATE_SUFFIXES, template_target};
pub use error::{EngineError, Result, TemplateError, TemplateErrorKind};
pub use overlay::{
    OverlayAction, OverlayPlan, OverlayReport, OverlayStep, SkipReason, execute_overlay,
    plan_overlay,
};
