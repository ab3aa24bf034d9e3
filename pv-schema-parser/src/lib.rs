//! Parsing of textual PV group schemas and of channel names.
//!
//! A schema file declares one or more groups:
//!
//! ```text
//! /// Example group of PVs
//! group Group {
//!     /// Poke me to exit
//!     attribute int exit;
//!     readonly attribute int random1;
//!     /// A configurable random number
//!     function get_random(int low = [100], int high = [1000]) -> int;
//! }
//! ```
//!
//! `///` lines document the item that follows, `//` lines are ignored.

mod error;
mod parser;
mod record;

use pv_data_model::GroupSchema;

pub use error::SchemaError;
pub use record::{parse_channel_filter, parse_record_field, FilterError, RecordField, RecordModifier};

/// Every group declared in one schema source.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    pub groups: Vec<GroupSchema>,
}

impl Schema {
    pub fn parse(input: &str) -> Result<Schema, SchemaError> {
        let groups = parser::schema(input)?;
        tracing::debug!(groups = groups.len(), "parsed schema");
        Ok(Schema { groups })
    }

    pub fn group(&self, name: &str) -> Option<&GroupSchema> {
        self.groups.iter().find(|g| g.name == name)
    }
}
