//! Templated email resolution and rendering (§4.9). Builtin templates ship
//! compiled in; a custom row overrides a builtin by `template_key`.

pub mod preview;
pub mod render;
pub mod template;

pub use preview::preview;
pub use render::{render, substitute, RenderedEmail};
pub use template::{resolve, upsert_custom, EmailTemplate, TemplateSource};
