pub mod csv_processor;
pub mod raw_table;

pub use csv_processor::{parse_csv, parse_csv_file, ParseError};
pub use raw_table::{Records, Table};
