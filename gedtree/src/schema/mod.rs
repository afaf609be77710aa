mod parser;
mod store;
mod types;

pub use parser::parse_grammar_str;
pub use store::GrammarSchemaStore;
pub use types::{
    Cardinality, LineKind, LineVariation, SchemaBlock, SchemaHeader, SchemaLine, SchemaStructure,
    NULL_VALUE,
};
