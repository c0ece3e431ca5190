//! Onion search engine implementations.

mod ahmia;
mod links;
mod registry;
mod template;

pub use ahmia::Ahmia;
pub use links::{collect_links, extract_onion_links};
pub use registry::{build_engine, default_specs, EngineRegistry};
pub use template::{TemplateEngine, QUERY_PLACEHOLDER};
