//! Client binding generation for PV groups.
//!
//! Bindings expose every standalone variable of a group as a typed signal
//! field and every function cluster as a nested type whose `call` drives the
//! put/trigger/poll sequence of the call emulation protocol.

mod cluster;
mod error;

use std::collections::HashMap;

use convert_case::{Case, Casing};
use proc_macro2::{Ident, Literal, Span, TokenStream};
use pv_data_model::{Access, ElementType, EndpointSchema, GroupSchema, Value};
use quote::{format_ident, quote};

use cluster::{Cluster, Entry, Standalone};

pub use error::GenerationError;

/// Path of the client runtime the generated code refers to.
pub const DEFAULT_RUNTIME: &str = "::pv_group::client";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateOptions {
    pub runtime: String,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            runtime: DEFAULT_RUNTIME.to_string(),
        }
    }
}

/// Generated items, in emission order.
#[derive(Debug, Clone)]
pub struct Binding {
    items: Vec<TokenStream>,
}

impl Binding {
    pub fn tokens(&self) -> TokenStream {
        self.items.iter().cloned().collect()
    }

    /// One line per generated item.
    pub fn lines(&self) -> Vec<String> {
        self.items.iter().map(|item| item.to_string()).collect()
    }

    pub fn render(&self) -> String {
        let mut out = self.lines().join("\n");
        out.push('\n');
        out
    }
}

/// `get_random` -> `GetRandom`
fn upper_camel(name: &str) -> String {
    name.to_case(Case::UpperCamel)
}

fn rust_type(element_type: ElementType) -> TokenStream {
    match element_type {
        ElementType::Int => quote!(Vec<i64>),
        ElementType::Double => quote!(Vec<f64>),
        ElementType::Char => quote!(Vec<u8>),
        ElementType::String | ElementType::Enum => quote!(String),
    }
}

fn value_tokens(value: &Value) -> TokenStream {
    match value {
        Value::Int(v) => {
            let items = v.iter().map(|i| Literal::i64_suffixed(*i));
            quote!(vec![#(#items),*])
        }
        Value::Double(v) => {
            let items = v.iter().map(|d| Literal::f64_suffixed(*d));
            quote!(vec![#(#items),*])
        }
        Value::Char(v) => {
            let items = v.iter().map(|b| Literal::u8_suffixed(*b));
            quote!(vec![#(#items),*])
        }
        Value::String(s) | Value::Enum(s) => {
            let s = Literal::string(s);
            quote!(String::from(#s))
        }
    }
}

fn doc_attr(doc: &str) -> TokenStream {
    if doc.is_empty() {
        quote!()
    } else {
        quote!(#[doc = #doc])
    }
}

fn ident(name: &str) -> Ident {
    Ident::new(name, Span::call_site())
}

/// Format string building a member name from the local `prefix`.
fn member_name(suffix: &str) -> Literal {
    Literal::string(&format!("{{prefix}}{suffix}"))
}

fn signal_type(rt: &TokenStream, element_type: ElementType, access: Access) -> TokenStream {
    let ty = rust_type(element_type);
    match access {
        Access::ReadOnly => quote!(#rt::SignalRo<#ty>),
        Access::ReadWrite => quote!(#rt::Signal<#ty>),
    }
}

fn cluster_items(rt: &TokenStream, type_name: &Ident, cluster: &Cluster) -> TokenStream {
    let doc = doc_attr(cluster.doc);
    let names: Vec<Ident> = cluster.parameters.iter().map(|p| ident(p.name)).collect();
    let types: Vec<TokenStream> = cluster
        .parameters
        .iter()
        .map(|p| rust_type(p.element_type))
        .collect();
    let param_docs = cluster.parameters.iter().map(|p| doc_attr(p.doc));
    let param_names = cluster.parameters.iter().map(|p| member_name(p.name));
    let defaults = cluster.parameters.iter().map(|p| value_tokens(&p.default));
    let ret = rust_type(cluster.return_type);
    let status = member_name(pv_data_model::STATUS);
    let retval = member_name(pv_data_model::RETVAL);
    let process = member_name(pv_data_model::PROCESS);

    quote! {
        #doc
        #[derive(Clone)]
        pub struct #type_name {
            #( #param_docs pub #names: #rt::Signal<#types>, )*
            pub status: #rt::SignalRo<String>,
            pub retval: #rt::SignalRo<#ret>,
            pub process: #rt::Signal<Vec<i64>>,
            lock: #rt::CallLock,
        }

        impl #type_name {
            pub fn new(
                transport: std::sync::Arc<dyn #rt::Transport>,
                prefix: &str,
                config: &#rt::ClientConfig,
            ) -> Self {
                Self {
                    #( #names: #rt::Signal::new(transport.clone(), format!(#param_names), config), )*
                    status: #rt::SignalRo::new(transport.clone(), format!(#status), config),
                    retval: #rt::SignalRo::new(transport.clone(), format!(#retval), config),
                    process: #rt::Signal::new(transport, format!(#process), config),
                    lock: #rt::CallLock::default(),
                }
            }

            #doc
            pub async fn call(&self, #( #names: #types ),*) -> Result<#ret, #rt::CallError> {
                let __call_guard = self.lock.acquire().await;
                #( self.#names.put_wait(#names).await?; )*
                self.process.put_wait(vec![1i64]).await?;
                let status = self.status.get(#rt::Freshness::Fresh).await?;
                let retval = self.retval.get(#rt::Freshness::Fresh).await?;
                #rt::check_status(status, retval)
            }

            pub async fn call_with_defaults(&self) -> Result<#ret, #rt::CallError> {
                self.call(#( #defaults ),*).await
            }
        }
    }
}

/// Generates bindings for a group from its endpoints in registry order.
pub fn generate(
    group_name: &str,
    group_doc: &str,
    endpoints: &[EndpointSchema],
    options: &GenerateOptions,
) -> Result<Binding, GenerationError> {
    let rt: syn::Path = syn::parse_str(&options.runtime)
        .map_err(|_| GenerationError::InvalidRuntimePath(options.runtime.clone()))?;
    let rt = quote!(#rt);

    cluster::check_identifier(group_name)?;
    let entries = cluster::partition(endpoints)?;

    let group_type = format!("{}Binding", upper_camel(group_name));
    let mut type_names: HashMap<String, &str> = HashMap::new();
    type_names.insert(group_type.clone(), group_name);
    for entry in &entries {
        if let Entry::Cluster(c) = entry {
            let type_name = format!("{}Binding", upper_camel(c.name));
            if type_names.insert(type_name.clone(), c.name).is_some() {
                return Err(GenerationError::TypeNameCollision {
                    name: c.name.to_string(),
                    type_name,
                });
            }
        }
    }

    let mut items = Vec::new();
    let mut fields = Vec::new();
    let mut inits = Vec::new();

    for entry in &entries {
        match entry {
            Entry::Cluster(c) => {
                let type_name = format_ident!("{}Binding", upper_camel(c.name));
                items.push(cluster_items(&rt, &type_name, c));

                let field = ident(c.name);
                let doc = doc_attr(c.doc);
                let name = member_name(&pv_data_model::member_suffix(c.name, ""));
                fields.push(quote!(#doc pub #field: #type_name));
                inits.push(quote!(#field: #type_name::new(transport.clone(), &format!(#name), config)));
            }
            Entry::Standalone(Standalone {
                suffix,
                element_type,
                access,
                doc,
            }) => {
                let field = ident(suffix);
                let doc = doc_attr(doc);
                let ty = signal_type(&rt, *element_type, *access);
                let constructor = match access {
                    Access::ReadOnly => quote!(#rt::SignalRo::new),
                    Access::ReadWrite => quote!(#rt::Signal::new),
                };
                let name = member_name(suffix);
                fields.push(quote!(#doc pub #field: #ty));
                inits.push(quote!(#field: #constructor(transport.clone(), format!(#name), config)));
            }
        }
    }

    let group_ident = ident(&group_type);
    let doc = doc_attr(group_doc);
    items.push(quote! {
        #doc
        #[derive(Clone)]
        pub struct #group_ident {
            #( #fields, )*
        }

        impl #group_ident {
            pub fn new(
                transport: std::sync::Arc<dyn #rt::Transport>,
                prefix: &str,
                config: &#rt::ClientConfig,
            ) -> Self {
                Self {
                    #( #inits, )*
                }
            }
        }
    });

    tracing::debug!(group = group_name, items = items.len(), "generated bindings");
    Ok(Binding { items })
}

pub fn generate_group(group: &GroupSchema, options: &GenerateOptions) -> Result<Binding, GenerationError> {
    generate(&group.name, &group.doc, &group.endpoints(), options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_tokenstreams_eq::assert_tokenstreams_eq;
    use pv_data_model::{ClusterMember, MemberRole};
    use pv_schema_parser::Schema;
    use rstest::rstest;

    fn parse_group(input: &str) -> GroupSchema {
        let schema = Schema::parse(input).expect("valid input");
        schema.groups.into_iter().next().expect("one group")
    }

    fn options() -> GenerateOptions {
        GenerateOptions {
            runtime: "rt".to_string(),
        }
    }

    #[rstest]
    #[case("get_random", "GetRandom")]
    #[case("Group", "Group")]
    #[case("a__b", "AB")]
    #[case("x1_y", "X1Y")]
    fn camel_case(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(upper_camel(input), expected);
    }

    #[test]
    fn standalone_fields() {
        let group = parse_group(
            "
            /// Demo
            group Demo {
                /// Poke me to exit
                attribute int exit;
                readonly attribute double temperature;
            }
            ",
        );

        assert_tokenstreams_eq!(
            &generate_group(&group, &options()).expect("valid schema").tokens(),
            &quote!(
                #[doc = "Demo"]
                #[derive(Clone)]
                pub struct DemoBinding {
                    #[doc = "Poke me to exit"]
                    pub exit: rt::Signal<Vec<i64>>,
                    pub temperature: rt::SignalRo<Vec<f64>>,
                }

                impl DemoBinding {
                    pub fn new(
                        transport: std::sync::Arc<dyn rt::Transport>,
                        prefix: &str,
                        config: &rt::ClientConfig,
                    ) -> Self {
                        Self {
                            exit: rt::Signal::new(transport.clone(), format!("{prefix}exit"), config),
                            temperature: rt::SignalRo::new(transport.clone(), format!("{prefix}temperature"), config),
                        }
                    }
                }
            )
        );
    }

    #[test]
    fn function_cluster() {
        let group = parse_group(
            "
            group Group {
                /// A configurable random number
                function get_random(int low = [100], int high = [1000]) -> int;
            }
            ",
        );

        assert_tokenstreams_eq!(
            &generate_group(&group, &options()).expect("valid schema").tokens(),
            &quote!(
                #[doc = "A configurable random number"]
                #[derive(Clone)]
                pub struct GetRandomBinding {
                    #[doc = "Parameter int low"]
                    pub low: rt::Signal<Vec<i64>>,
                    #[doc = "Parameter int high"]
                    pub high: rt::Signal<Vec<i64>>,
                    pub status: rt::SignalRo<String>,
                    pub retval: rt::SignalRo<Vec<i64>>,
                    pub process: rt::Signal<Vec<i64>>,
                    lock: rt::CallLock,
                }

                impl GetRandomBinding {
                    pub fn new(
                        transport: std::sync::Arc<dyn rt::Transport>,
                        prefix: &str,
                        config: &rt::ClientConfig,
                    ) -> Self {
                        Self {
                            low: rt::Signal::new(transport.clone(), format!("{prefix}low"), config),
                            high: rt::Signal::new(transport.clone(), format!("{prefix}high"), config),
                            status: rt::SignalRo::new(transport.clone(), format!("{prefix}Status"), config),
                            retval: rt::SignalRo::new(transport.clone(), format!("{prefix}Retval"), config),
                            process: rt::Signal::new(transport, format!("{prefix}Process"), config),
                            lock: rt::CallLock::default(),
                        }
                    }

                    #[doc = "A configurable random number"]
                    pub async fn call(&self, low: Vec<i64>, high: Vec<i64>) -> Result<Vec<i64>, rt::CallError> {
                        let __call_guard = self.lock.acquire().await;
                        self.low.put_wait(low).await?;
                        self.high.put_wait(high).await?;
                        self.process.put_wait(vec![1i64]).await?;
                        let status = self.status.get(rt::Freshness::Fresh).await?;
                        let retval = self.retval.get(rt::Freshness::Fresh).await?;
                        rt::check_status(status, retval)
                    }

                    pub async fn call_with_defaults(&self) -> Result<Vec<i64>, rt::CallError> {
                        self.call(vec![100i64], vec![1000i64]).await
                    }
                }

                #[derive(Clone)]
                pub struct GroupBinding {
                    #[doc = "A configurable random number"]
                    pub get_random: GetRandomBinding,
                }

                impl GroupBinding {
                    pub fn new(
                        transport: std::sync::Arc<dyn rt::Transport>,
                        prefix: &str,
                        config: &rt::ClientConfig,
                    ) -> Self {
                        Self {
                            get_random: GetRandomBinding::new(transport.clone(), &format!("{prefix}get_random:"), config),
                        }
                    }
                }
            )
        );
    }

    #[test]
    fn string_and_double_defaults() {
        let group = parse_group(
            "group G { function f(double gain = [0.5], string label = \"x\") -> string; }",
        );
        let tokens = generate_group(&group, &options()).expect("valid schema").tokens().to_string();
        assert!(tokens.contains(&quote!(self.call(vec![0.5f64], String::from("x")).await).to_string()));
        assert!(tokens.contains(&quote!(Result<String, rt::CallError>).to_string()));
    }

    #[test]
    fn output_follows_registration_order() {
        let group = parse_group(
            "
            group G {
                attribute int b;
                function f() -> int;
                attribute int a;
            }
            ",
        );
        let binding = generate_group(&group, &options()).expect("valid schema");
        let lines = binding.lines();
        assert_eq!(lines.len(), 2);
        let aggregate = &lines[1];
        let b = aggregate.find("pub b").expect("field b");
        let f = aggregate.find("pub f").expect("field f");
        let a = aggregate.find("pub a").expect("field a");
        assert!(b < f && f < a);
    }

    #[test]
    fn reordering_registrations_only_reorders_output() {
        let forward = parse_group(
            "
            group G {
                attribute int a;
                function f(int x = [1]) -> int;
                readonly attribute double b;
                function g() -> double;
            }
            ",
        );
        let reversed = parse_group(
            "
            group G {
                function g() -> double;
                readonly attribute double b;
                function f(int x = [1]) -> int;
                attribute int a;
            }
            ",
        );
        let forward = generate_group(&forward, &options()).expect("valid schema");
        let reversed = generate_group(&reversed, &options()).expect("valid schema");

        // cluster types come first, in registration order, then the aggregate
        let (forward, reversed) = (forward.lines(), reversed.lines());
        assert_eq!(forward.len(), 3);
        assert_eq!(forward[0], reversed[1]);
        assert_eq!(forward[1], reversed[0]);
        assert_ne!(forward[2], reversed[2]);

        let fields = |aggregate: &str| {
            let mut fields: Vec<String> = ["pub a", "pub b", "pub f", "pub g"]
                .iter()
                .map(|field| {
                    let start = aggregate.find(field).expect("field present");
                    let end = start + aggregate[start..].find(',').expect("field ends");
                    aggregate[start..end].to_string()
                })
                .collect();
            fields.sort();
            fields
        };
        assert_eq!(fields(&forward[2]), fields(&reversed[2]));
        let position = |aggregate: &str, field: &str| aggregate.find(field).expect("field present");
        assert!(position(&forward[2], "pub a") < position(&forward[2], "pub g"));
        assert!(position(&reversed[2], "pub g") < position(&reversed[2], "pub a"));
    }

    #[test]
    fn generation_is_deterministic() {
        let group = parse_group(
            "
            group Group {
                attribute int exit;
                function get_random(int low = [100], int high = [1000]) -> int;
                function other(double x) -> double;
            }
            ",
        );
        let first = generate_group(&group, &GenerateOptions::default()).expect("valid schema");
        let second = generate_group(&group, &GenerateOptions::default()).expect("valid schema");
        assert_eq!(first.lines(), second.lines());
        assert_eq!(first.render(), second.render());
    }

    #[test]
    fn base_name_collision_with_standalone() {
        let group = parse_group(
            "
            group G {
                attribute int get_random;
                function get_random(int low) -> int;
            }
            ",
        );
        assert_eq!(
            generate_group(&group, &options()).map(|_| ()),
            Err(GenerationError::NameCollision("get_random".into()))
        );
    }

    #[test]
    fn unknown_element_type() {
        let endpoints = vec![EndpointSchema {
            suffix: "x".into(),
            element_type: "quaternion".into(),
            access: Access::ReadWrite,
            doc: String::new(),
            cluster: None,
        }];
        assert_eq!(
            generate("G", "", &endpoints, &options()).map(|_| ()),
            Err(GenerationError::UnknownElementType {
                endpoint: "x".into(),
                element_type: "quaternion".into(),
            })
        );
    }

    #[test]
    fn incomplete_cluster() {
        let mut endpoints = parse_group("group G { function f() -> int; }").endpoints();
        endpoints.retain(|e| !e.suffix.ends_with(pv_data_model::PROCESS));
        assert!(matches!(
            generate("G", "", &endpoints, &options()),
            Err(GenerationError::MalformedCluster { ref function, .. }) if function == "f"
        ));
    }

    #[test]
    fn misnamed_cluster_member() {
        let endpoints = vec![EndpointSchema {
            suffix: "f:State".into(),
            element_type: "enum".into(),
            access: Access::ReadOnly,
            doc: String::new(),
            cluster: Some(ClusterMember {
                function: "f".into(),
                doc: String::new(),
                role: MemberRole::Status,
            }),
        }];
        assert!(matches!(
            generate("G", "", &endpoints, &options()),
            Err(GenerationError::MalformedCluster { .. })
        ));
    }

    #[rstest]
    #[case("group G { attribute int type; }", GenerationError::InvalidIdentifier("type".into()))]
    #[case(
        "group G { function f(int status) -> int; }",
        GenerationError::FieldCollision { function: "f".into(), parameter: "status".into() }
    )]
    #[case(
        "group G { function f(int __call_guard) -> int; }",
        GenerationError::FieldCollision { function: "f".into(), parameter: "__call_guard".into() }
    )]
    #[case(
        "group G { function g() -> int; }",
        GenerationError::TypeNameCollision { name: "g".into(), type_name: "GBinding".into() }
    )]
    fn rejected_schemas(#[case] input: &str, #[case] expected: GenerationError) {
        let group = parse_group(input);
        assert_eq!(generate_group(&group, &options()).map(|_| ()), Err(expected));
    }

    #[test]
    fn duplicate_endpoint() {
        let mut endpoints = parse_group("group G { attribute int x; }").endpoints();
        endpoints.push(endpoints[0].clone());
        assert_eq!(
            generate("G", "", &endpoints, &options()).map(|_| ()),
            Err(GenerationError::DuplicateEndpoint("x".into()))
        );
    }

    #[test]
    fn invalid_runtime_path() {
        let options = GenerateOptions {
            runtime: "not a path".into(),
        };
        assert_eq!(
            generate("G", "", &[], &options).map(|_| ()),
            Err(GenerationError::InvalidRuntimePath("not a path".into()))
        );
    }
}
