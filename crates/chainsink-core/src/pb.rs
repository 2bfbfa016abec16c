//! Wire types for the `DatabaseChanges` payload emitted by sink modules.
//!
//! ```text
//! DatabaseChanges
//!   └── TableChange { table, pk, ordinal, operation, fields[] }
//!         └── Field { name, new_value, old_value }
//! ```
//!
//! `ordinal` and `old_value` are decoded for wire compatibility only; the
//! applier works with new values exclusively.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DatabaseChanges {
    #[prost(message, repeated, tag = "1")]
    pub table_changes: ::prost::alloc::vec::Vec<TableChange>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TableChange {
    #[prost(string, tag = "1")]
    pub table: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub pk: ::prost::alloc::string::String,
    #[prost(uint64, tag = "3")]
    pub ordinal: u64,
    #[prost(enumeration = "table_change::Operation", tag = "4")]
    pub operation: i32,
    #[prost(message, repeated, tag = "5")]
    pub fields: ::prost::alloc::vec::Vec<Field>,
}

pub mod table_change {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Operation {
        Unset = 0,
        Create = 1,
        Update = 2,
        Delete = 3,
    }

    impl Operation {
        pub fn as_str_name(&self) -> &'static str {
            match self {
                Operation::Unset => "UNSET",
                Operation::Create => "CREATE",
                Operation::Update => "UPDATE",
                Operation::Delete => "DELETE",
            }
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Field {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub new_value: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub old_value: ::prost::alloc::string::String,
}

impl TableChange {
    /// Convenience constructor used by producers and tests.
    pub fn new(
        table: impl Into<String>,
        pk: impl Into<String>,
        operation: table_change::Operation,
        fields: Vec<(&str, &str)>,
    ) -> Self {
        Self {
            table: table.into(),
            pk: pk.into(),
            ordinal: 0,
            operation: operation as i32,
            fields: fields
                .into_iter()
                .map(|(name, value)| Field {
                    name: name.to_string(),
                    new_value: value.to_string(),
                    old_value: String::new(),
                })
                .collect(),
        }
    }
}
