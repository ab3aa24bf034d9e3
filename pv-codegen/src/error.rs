use miette::Diagnostic;
use thiserror::Error;

/// Reasons a schema cannot be turned into bindings.
///
/// Generation checks the whole schema before emitting anything, so any of
/// these means no output at all.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum GenerationError {
    #[error("endpoint `{endpoint}` has unknown element type `{element_type}`")]
    #[diagnostic(code(pv_codegen::unknown_type))]
    UnknownElementType {
        endpoint: String,
        element_type: String,
    },

    #[error("endpoint `{0}` is declared more than once")]
    #[diagnostic(code(pv_codegen::duplicate))]
    DuplicateEndpoint(String),

    #[error("function `{0}` collides with a standalone endpoint of the same name")]
    #[diagnostic(code(pv_codegen::name_collision))]
    NameCollision(String),

    #[error("`{name}` would generate type `{type_name}` twice")]
    #[diagnostic(code(pv_codegen::type_collision))]
    TypeNameCollision { name: String, type_name: String },

    #[error("parameter `{parameter}` of `{function}` collides with a generated field")]
    #[diagnostic(code(pv_codegen::field_collision))]
    FieldCollision { function: String, parameter: String },

    #[error("function `{function}`: {reason}")]
    #[diagnostic(code(pv_codegen::malformed_cluster))]
    MalformedCluster { function: String, reason: String },

    #[error("`{0}` is not a valid Rust identifier")]
    #[diagnostic(
        code(pv_codegen::invalid_identifier),
        help("endpoint and parameter names become struct fields")
    )]
    InvalidIdentifier(String),

    #[error("default of `{endpoint}` cannot be emitted: {reason}")]
    #[diagnostic(code(pv_codegen::invalid_default))]
    InvalidDefault { endpoint: String, reason: String },

    #[error("`{0}` is not a valid runtime path")]
    #[diagnostic(code(pv_codegen::invalid_runtime))]
    InvalidRuntimePath(String),
}
