//! Scan template management

pub mod use_cases;

pub use use_cases::{
    AutoCreateTemplateResult, AutoCreateTemplateUseCase, CreateTemplateUseCase,
    DeleteTemplateUseCase, GetTemplateUseCase, ListTemplatesUseCase, TemplateDefinition,
    UpdateTemplateUseCase,
};
