//! Manual severity/status overrides and change history

pub mod use_cases;

pub use use_cases::{
    ChangeHistoryQuery, ManualChangeResult, ManualOverrideUseCase, OverrideTarget,
    ResetOverrideUseCase,
};
