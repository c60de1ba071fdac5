mod common;
mod convert;
mod init;
mod query;
mod serve;
mod validate;

pub use common::{LogLevel, init_logging};
pub use convert::{ConvertArgs, convert_config};
pub use init::{InitArgs, init_config};
pub use query::{QueryArgs, query_counts};
pub use serve::{ServeArgs, serve};
pub use validate::{ValidateArgs, validate_config};
