pub mod grouping;
pub mod stats;
pub mod table_reader;
pub mod types;
