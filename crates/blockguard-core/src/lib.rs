//! Detection engine: block model, markup parsing, registry classification,
//! structural validation, tree walking and issue rules.

pub mod error;
pub mod markers;
pub mod model;
pub mod normalize;
pub mod parser;
pub mod registry;
pub mod render;
pub mod rules;
pub mod validator;
pub mod walker;

pub use error::ConfigError;
pub use markers::{RECOVERY_MARKERS, check_markers, find_marker};
pub use model::{
    BlockNode, BlockStatus, Document, DocumentId, DocumentStatus, Issue, IssueKind, Severity,
    block_namespace,
};
pub use normalize::normalize_markup;
pub use parser::{ParseError, parse_blocks, serialize_blocks};
pub use registry::{BlockClass, BlockDefinition, BlockRegistry, RegistryEntry};
pub use render::{BlockRenderer, RenderError, TemplateRenderer, UnavailableRenderer};
pub use rules::{Condition, Rule, RuleContext, RuleResult, RuleSet, default_rules};
pub use validator::{Validator, Verdict};
pub use walker::{TreeWalk, walk};
