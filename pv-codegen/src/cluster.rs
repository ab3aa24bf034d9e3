//! Splits a flat endpoint list into standalone variables and function
//! clusters, validating everything generation relies on.

use std::collections::{HashMap, HashSet};

use pv_data_model::{
    member_suffix, Access, ElementType, EndpointSchema, MemberRole, Value, PROCESS, RETVAL, STATUS,
};

use crate::GenerationError;

/// Names every cluster binding already uses, as fields or as locals of `call`.
const RESERVED_FIELDS: [&str; 5] = ["status", "retval", "process", "lock", "__call_guard"];

pub(crate) struct Standalone<'a> {
    pub suffix: &'a str,
    pub element_type: ElementType,
    pub access: Access,
    pub doc: &'a str,
}

pub(crate) struct Parameter<'a> {
    pub name: &'a str,
    pub element_type: ElementType,
    pub default: Value,
    pub doc: &'a str,
}

pub(crate) struct Cluster<'a> {
    pub name: &'a str,
    pub doc: &'a str,
    pub parameters: Vec<Parameter<'a>>,
    pub return_type: ElementType,
}

pub(crate) enum Entry<'a> {
    Standalone(Standalone<'a>),
    Cluster(Cluster<'a>),
}

#[derive(Default)]
struct PendingCluster<'a> {
    name: &'a str,
    doc: &'a str,
    parameters: Vec<Parameter<'a>>,
    status: bool,
    retval: Option<ElementType>,
    process: bool,
}

enum PendingEntry<'a> {
    Standalone(Standalone<'a>),
    Cluster(PendingCluster<'a>),
}

fn malformed(function: &str, reason: impl Into<String>) -> GenerationError {
    GenerationError::MalformedCluster {
        function: function.to_string(),
        reason: reason.into(),
    }
}

/// Plain identifiers only: keywords and raw identifiers are rejected.
pub(crate) fn check_identifier(name: &str) -> Result<(), GenerationError> {
    match syn::parse_str::<syn::Ident>(name) {
        Ok(_) if !name.starts_with("r#") => Ok(()),
        _ => Err(GenerationError::InvalidIdentifier(name.to_string())),
    }
}

fn check_default(
    endpoint: &str,
    default: &Value,
    element_type: ElementType,
) -> Result<Value, GenerationError> {
    let invalid = |reason: String| GenerationError::InvalidDefault {
        endpoint: endpoint.to_string(),
        reason,
    };

    let value = default
        .clone()
        .coerce(element_type)
        .ok_or_else(|| invalid(format!("{default} is not a {element_type} value")))?;
    if let Value::Double(v) = &value {
        if v.iter().any(|d| !d.is_finite()) {
            return Err(invalid("non-finite doubles have no literal".to_string()));
        }
    }
    Ok(value)
}

impl<'a> PendingCluster<'a> {
    fn add(
        &mut self,
        endpoint: &'a EndpointSchema,
        element_type: ElementType,
        role: &'a MemberRole,
    ) -> Result<(), GenerationError> {
        let function = self.name;
        let expect_suffix = |member: &str| {
            if endpoint.suffix == member_suffix(function, member) {
                Ok(())
            } else {
                Err(malformed(
                    function,
                    format!("`{}` should be named `{}`", endpoint.suffix, member_suffix(function, member)),
                ))
            }
        };

        match role {
            MemberRole::Parameter { default } => {
                let name = endpoint
                    .suffix
                    .strip_prefix(function)
                    .and_then(|rest| rest.strip_prefix(':'))
                    .ok_or_else(|| {
                        malformed(function, format!("parameter `{}` is outside the cluster", endpoint.suffix))
                    })?;
                if endpoint.access != Access::ReadWrite {
                    return Err(malformed(function, format!("parameter `{name}` must be writable")));
                }
                self.parameters.push(Parameter {
                    name,
                    element_type,
                    default: check_default(&endpoint.suffix, default, element_type)?,
                    doc: &endpoint.doc,
                });
            }
            MemberRole::Status => {
                expect_suffix(STATUS)?;
                if self.status {
                    return Err(malformed(function, "more than one Status"));
                }
                if element_type.kind() != pv_data_model::Kind::EnumString {
                    return Err(malformed(function, "Status must hold a string"));
                }
                self.status = true;
            }
            MemberRole::Retval => {
                expect_suffix(RETVAL)?;
                if self.retval.is_some() {
                    return Err(malformed(function, "more than one Retval"));
                }
                self.retval = Some(element_type);
            }
            MemberRole::Process => {
                expect_suffix(PROCESS)?;
                if self.process {
                    return Err(malformed(function, "more than one Process"));
                }
                if element_type != ElementType::Int {
                    return Err(malformed(function, "Process must be an int trigger"));
                }
                self.process = true;
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Cluster<'a>, GenerationError> {
        if !self.status {
            return Err(malformed(self.name, "missing Status"));
        }
        if !self.process {
            return Err(malformed(self.name, "missing Process"));
        }
        let return_type = self
            .retval
            .ok_or_else(|| malformed(self.name, "missing Retval"))?;

        check_identifier(self.name)?;
        for p in &self.parameters {
            check_identifier(p.name)?;
            if RESERVED_FIELDS.contains(&p.name) {
                return Err(GenerationError::FieldCollision {
                    function: self.name.to_string(),
                    parameter: p.name.to_string(),
                });
            }
        }

        Ok(Cluster {
            name: self.name,
            doc: self.doc,
            parameters: self.parameters,
            return_type,
        })
    }
}

/// Groups endpoints by cluster, keeping each cluster where its first member
/// appeared.
pub(crate) fn partition(endpoints: &[EndpointSchema]) -> Result<Vec<Entry<'_>>, GenerationError> {
    let mut seen = HashSet::new();
    let mut pending: Vec<PendingEntry> = Vec::new();
    let mut clusters: HashMap<&str, usize> = HashMap::new();

    for endpoint in endpoints {
        if !seen.insert(endpoint.suffix.as_str()) {
            return Err(GenerationError::DuplicateEndpoint(endpoint.suffix.clone()));
        }

        let element_type: ElementType =
            endpoint
                .element_type
                .parse()
                .map_err(|_| GenerationError::UnknownElementType {
                    endpoint: endpoint.suffix.clone(),
                    element_type: endpoint.element_type.clone(),
                })?;

        let Some(member) = &endpoint.cluster else {
            pending.push(PendingEntry::Standalone(Standalone {
                suffix: &endpoint.suffix,
                element_type,
                access: endpoint.access,
                doc: &endpoint.doc,
            }));
            continue;
        };

        let index = *clusters.entry(member.function.as_str()).or_insert_with(|| {
            pending.push(PendingEntry::Cluster(PendingCluster {
                name: &member.function,
                doc: &member.doc,
                ..Default::default()
            }));
            pending.len() - 1
        });
        if let PendingEntry::Cluster(cluster) = &mut pending[index] {
            cluster.add(endpoint, element_type, &member.role)?;
        }
    }

    let standalone: HashSet<&str> = pending
        .iter()
        .filter_map(|e| match e {
            PendingEntry::Standalone(s) => Some(s.suffix),
            PendingEntry::Cluster(_) => None,
        })
        .collect();
    for entry in &pending {
        if let PendingEntry::Cluster(c) = entry {
            if standalone.contains(c.name) {
                return Err(GenerationError::NameCollision(c.name.to_string()));
            }
        }
    }

    pending
        .into_iter()
        .map(|entry| match entry {
            PendingEntry::Standalone(s) => {
                check_identifier(s.suffix)?;
                Ok(Entry::Standalone(s))
            }
            PendingEntry::Cluster(c) => c.finish().map(Entry::Cluster),
        })
        .collect()
}
