pub mod claude;
pub mod error;
pub mod traits;
pub mod util;

pub use claude::Claude;
pub use error::AiError;
pub use traits::{CompletionRequest, TextAgent};
pub use util::{
    first_integer, first_json_array, first_json_object, strip_code_blocks, truncate_to_char_boundary,
};
