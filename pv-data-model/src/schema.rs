use serde::{Deserialize, Serialize};

use crate::{Access, ElementType, Value};

/// Suffix of the status member of a function cluster.
pub const STATUS: &str = "Status";
/// Suffix of the return-value member of a function cluster.
pub const RETVAL: &str = "Retval";
/// Suffix of the trigger member of a function cluster.
pub const PROCESS: &str = "Process";

/// Strings a function cluster's `Status` variable can take.
pub mod status {
    pub const INIT: &str = "Init";
    pub const RUNNING: &str = "Running";
    pub const SUCCESS: &str = "Success";
    pub const ERROR: &str = "Error";

    pub const STRINGS: [&str; 4] = [INIT, RUNNING, SUCCESS, ERROR];
}

/// Name of one member of a function cluster, relative to the group prefix.
pub fn member_suffix(function: &str, member: &str) -> String {
    format!("{function}:{member}")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberRole {
    Parameter { default: Value },
    Status,
    Retval,
    Process,
}

/// Tags an endpoint as part of the cluster emulating `function`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterMember {
    pub function: String,
    pub doc: String,
    pub role: MemberRole,
}

/// One registered variable, as seen by a binding generator.
///
/// `element_type` is kept as its textual name: schemas may come from files
/// or other tools, and consumers validate it when they need the type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointSchema {
    pub suffix: String,
    pub element_type: String,
    pub access: Access,
    pub doc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSchema {
    pub name: String,
    pub element_type: String,
    pub access: Access,
    pub doc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSchema {
    pub name: String,
    pub element_type: String,
    pub default: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionSchema {
    pub name: String,
    pub doc: String,
    pub parameters: Vec<ParameterSchema>,
    pub return_type: String,
}

impl FunctionSchema {
    fn member(&self, role: MemberRole) -> Option<ClusterMember> {
        Some(ClusterMember {
            function: self.name.clone(),
            doc: self.doc.clone(),
            role,
        })
    }

    /// One read-write variable per parameter, holding its default.
    pub fn parameter_endpoints(&self) -> Vec<EndpointSchema> {
        self.parameters
            .iter()
            .map(|p| EndpointSchema {
                suffix: member_suffix(&self.name, &p.name),
                element_type: p.element_type.clone(),
                access: Access::ReadWrite,
                doc: format!("Parameter {} {}", p.element_type, p.name),
                cluster: self.member(MemberRole::Parameter {
                    default: p.default.clone(),
                }),
            })
            .collect()
    }

    pub fn status_endpoint(&self) -> EndpointSchema {
        EndpointSchema {
            suffix: member_suffix(&self.name, STATUS),
            element_type: ElementType::Enum.name().to_string(),
            access: Access::ReadOnly,
            doc: format!("Status of {}", self.name),
            cluster: self.member(MemberRole::Status),
        }
    }

    pub fn retval_endpoint(&self) -> EndpointSchema {
        EndpointSchema {
            suffix: member_suffix(&self.name, RETVAL),
            element_type: self.return_type.clone(),
            access: Access::ReadOnly,
            doc: format!("Return value of {}", self.name),
            cluster: self.member(MemberRole::Retval),
        }
    }

    pub fn process_endpoint(&self) -> EndpointSchema {
        EndpointSchema {
            suffix: member_suffix(&self.name, PROCESS),
            element_type: ElementType::Int.name().to_string(),
            access: Access::ReadWrite,
            doc: format!("Write to call {}", self.name),
            cluster: self.member(MemberRole::Process),
        }
    }

    /// The variables emulating this function, in registration order.
    pub fn endpoints(&self) -> Vec<EndpointSchema> {
        let mut endpoints = self.parameter_endpoints();
        endpoints.push(self.status_endpoint());
        endpoints.push(self.retval_endpoint());
        endpoints.push(self.process_endpoint());
        endpoints
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MemberSchema {
    Attribute(AttributeSchema),
    Function(FunctionSchema),
}

/// Declaration of a whole group, as written in a schema file.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GroupSchema {
    pub name: String,
    pub doc: String,
    pub members: Vec<MemberSchema>,
}

impl GroupSchema {
    /// Flattens the group into the endpoints a registry would hold for it.
    pub fn endpoints(&self) -> Vec<EndpointSchema> {
        let mut endpoints = Vec::new();
        for member in &self.members {
            match member {
                MemberSchema::Attribute(a) => endpoints.push(EndpointSchema {
                    suffix: a.name.clone(),
                    element_type: a.element_type.clone(),
                    access: a.access,
                    doc: a.doc.clone(),
                    cluster: None,
                }),
                MemberSchema::Function(f) => endpoints.extend(f.endpoints()),
            }
        }
        endpoints
    }
}
