pub mod eft;
pub mod model;

pub use eft::{normalize_eft, parse_eft, ParsedEft};
pub use model::{
    Fit, FitBuilder, FittedDrone, FittedModule, ModuleState, SkillProfile, SlotKind,
    DEFAULT_SKILL_LEVEL,
};
