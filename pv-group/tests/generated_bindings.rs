use assert_tokenstreams_eq::assert_tokenstreams_eq;
use proc_macro2::TokenStream;
use pv_codegen::{generate_group, GenerateOptions};
use pv_group::demo::{demo_group, SCHEMA};
use pv_schema_parser::Schema;
use tokio_util::sync::CancellationToken;

fn fixture() -> TokenStream {
    include_str!("bindings/demo.rs")
        .parse()
        .expect("fixture is valid Rust")
}

#[test]
fn demo_group_bindings_match_fixture() {
    let group = demo_group("integration:", CancellationToken::new()).expect("valid group");
    let binding = group
        .bindings(&GenerateOptions::default())
        .expect("valid schema");
    assert_tokenstreams_eq!(&binding.tokens(), &fixture());
}

#[test]
fn schema_file_generates_the_same_bindings() {
    let schema = Schema::parse(SCHEMA).expect("valid schema");
    let from_file = generate_group(&schema.groups[0], &GenerateOptions::default())
        .expect("valid schema");

    let group = demo_group("other:", CancellationToken::new()).expect("valid group");
    let from_registry = group
        .bindings(&GenerateOptions::default())
        .expect("valid schema");

    assert_eq!(from_file.render(), from_registry.render());
}

#[test]
fn prefix_does_not_change_bindings() {
    let a = demo_group("a:", CancellationToken::new()).expect("valid group");
    let b = demo_group("b:", CancellationToken::new()).expect("valid group");
    let options = GenerateOptions::default();
    assert_eq!(
        a.bindings(&options).expect("valid schema").lines(),
        b.bindings(&options).expect("valid schema").lines()
    );
}
