//! Example group: a shutdown trigger, two random readings and a configurable
//! random number function.

use anyhow::{bail, Context};
use pv_data_model::{ElementType, Value};
use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::endpoint::Descriptor;
use crate::error::RegistryError;
use crate::function::Function;
use crate::group::GroupBuilder;

pub const GROUP_NAME: &str = "Group";
pub const GROUP_DOC: &str = "Example group of PVs, where the prefix is defined on instantiation";

/// Schema text equivalent to [`demo_group`].
pub const SCHEMA: &str = r#"
/// Example group of PVs, where the prefix is defined on instantiation
group Group {
    /// Poke me to exit
    attribute int exit;
    /// Random integer between 1 and 100
    attribute int random1;
    /// A nice random integer between 1000 and 2000
    attribute int random2;
    /// A configurable random number
    function get_random(int low = [100], int high = [1000]) -> int;
}
"#;

fn random_reading(low: i64, high: i64) -> Descriptor {
    Descriptor::new(ElementType::Int).on_get(move || {
        let value = rand::rng().random_range(low..=high);
        async move { Ok(Value::Int(vec![value])) }
    })
}

fn first_int(args: &[Value], index: usize) -> anyhow::Result<i64> {
    match args.get(index) {
        Some(Value::Int(v)) => v.first().copied().context("empty parameter"),
        other => bail!("expected an int parameter, got {other:?}"),
    }
}

/// Writing anything to `exit` cancels `shutdown`.
pub fn demo_group(prefix: &str, shutdown: CancellationToken) -> Result<GroupBuilder, RegistryError> {
    let mut group = GroupBuilder::new(GROUP_NAME, prefix).with_doc(GROUP_DOC);

    group.add_variable(
        "exit",
        Descriptor::new(ElementType::Int)
            .doc("Poke me to exit")
            .on_put(move |_| {
                let shutdown = shutdown.clone();
                async move {
                    info!("Server shutting down");
                    shutdown.cancel();
                    Ok(None)
                }
            }),
    )?;
    group.add_variable(
        "random1",
        random_reading(1, 100).doc("Random integer between 1 and 100"),
    )?;
    group.add_variable(
        "random2",
        random_reading(1000, 2000).doc("A nice random integer between 1000 and 2000"),
    )?;

    group.add_function(
        Function::new("get_random", ElementType::Int, |args| async move {
            let low = first_int(&args, 0)?;
            let high = first_int(&args, 1)?;
            if low > high {
                bail!("low ({low}) is above high ({high})");
            }
            Ok(Value::Int(vec![rand::rng().random_range(low..=high)]))
        })
        .doc("A configurable random number")
        .parameter("low", ElementType::Int, vec![100i64])
        .parameter("high", ElementType::Int, vec![1000i64]),
    )?;

    Ok(group)
}
