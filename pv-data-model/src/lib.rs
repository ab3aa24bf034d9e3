//! Shared vocabulary for process-variable groups: element types, values and
//! the flat endpoint schema that describes a group to code generators.

mod schema;
mod value;

pub use schema::{
    member_suffix, status, AttributeSchema, ClusterMember, EndpointSchema, FunctionSchema,
    GroupSchema, MemberRole, MemberSchema, ParameterSchema, PROCESS, RETVAL, STATUS,
};
pub use value::{Access, ElementType, Kind, UnknownElementType, Value};
