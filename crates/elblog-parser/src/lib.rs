pub mod convert;
pub mod errors;
pub mod grammar;
pub mod model;

pub use convert::{parse_timestamp, timestamp_to_id, to_int, to_str};
pub use errors::ParserError;
pub use grammar::LineParser;
pub use model::{Field, ParsedFields};
