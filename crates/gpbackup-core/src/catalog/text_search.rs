use super::{class, make_fqn, UniqueId};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextSearchParser {
    pub oid: u32,
    pub schema: String,
    pub name: String,
    pub start_func: String,
    pub token_func: String,
    pub end_func: String,
    pub lex_types_func: String,
    pub headline_func: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextSearchTemplate {
    pub oid: u32,
    pub schema: String,
    pub name: String,
    pub init_func: String,
    pub lexize_func: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextSearchDictionary {
    pub oid: u32,
    pub schema: String,
    pub name: String,
    pub template: String,
    pub init_option: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextSearchConfiguration {
    pub oid: u32,
    pub schema: String,
    pub name: String,
    pub parser: String,

    /// Token type to dictionaries, ordered by token name.
    pub token_to_dicts: BTreeMap<String, Vec<String>>,
}

macro_rules! text_search_identity {
    ($($ty:ident => $class:ident,)*) => {
        $(
            impl $ty {
                pub fn fqn(&self) -> String {
                    make_fqn(&self.schema, &self.name)
                }

                pub fn unique_id(&self) -> UniqueId {
                    UniqueId::new(class::$class, self.oid)
                }
            }
        )*
    };
}

text_search_identity! {
    TextSearchParser => PG_TS_PARSER,
    TextSearchTemplate => PG_TS_TEMPLATE,
    TextSearchDictionary => PG_TS_DICT,
    TextSearchConfiguration => PG_TS_CONFIG,
}
