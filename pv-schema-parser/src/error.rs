use miette::{Diagnostic, SourceSpan};
use pv_data_model::ElementType;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SchemaError {
    #[error("syntax error: {message}")]
    #[diagnostic(code(pv_schema::syntax))]
    Syntax {
        #[source_code]
        src: String,
        #[label("here")]
        at: SourceSpan,
        message: String,
    },

    #[error("unknown element type `{name}`")]
    #[diagnostic(
        code(pv_schema::unknown_type),
        help("known element types are int, double, char, string and enum")
    )]
    UnknownType {
        #[source_code]
        src: String,
        #[label("not an element type")]
        at: SourceSpan,
        name: String,
    },

    #[error("default value {value} does not fit a {element_type} parameter")]
    #[diagnostic(code(pv_schema::invalid_default))]
    InvalidDefault {
        #[source_code]
        src: String,
        #[label("this default")]
        at: SourceSpan,
        value: String,
        element_type: ElementType,
    },
}

impl SchemaError {
    /// Byte offset in the source the error points at.
    pub fn offset(&self) -> usize {
        match self {
            SchemaError::Syntax { at, .. }
            | SchemaError::UnknownType { at, .. }
            | SchemaError::InvalidDefault { at, .. } => at.offset(),
        }
    }
}
