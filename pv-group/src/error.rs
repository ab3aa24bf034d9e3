use pv_data_model::ElementType;
use pv_schema_parser::FilterError;
use thiserror::Error;

/// Failures while declaring a group. All of them leave the registry as it
/// was before the failing call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("`{0}` is already registered")]
    DuplicateName(String),

    #[error("no endpoint named `{0}`")]
    NotFound(String),

    #[error("parameter `{parameter}` of `{function}` collides with a generated member")]
    ReservedParameter { function: String, parameter: String },

    #[error("initial value of `{name}` is not a {element_type} value")]
    InvalidInitial {
        name: String,
        element_type: ElementType,
    },
}

/// Failures of a single read or write against the PV database.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("no PV named `{0}`")]
    UnknownName(String),

    #[error("`{name}` has no field `{field}`")]
    UnknownField { name: String, field: String },

    #[error("invalid filter on `{name}`: {source}")]
    Filter {
        name: String,
        #[source]
        source: FilterError,
    },

    #[error("`{0}` is read-only")]
    ReadOnly(String),

    #[error("`{name}` holds {expected} values, got {found}")]
    TypeMismatch {
        name: String,
        expected: ElementType,
        found: ElementType,
    },

    #[error("{value:?} is not one of the strings of `{name}`")]
    NotInEnum { name: String, value: String },

    #[error("handler of `{name}` failed: {source}")]
    Handler {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}
