mod claim;
mod default_value;
mod resource;

pub use claim::*;
pub use default_value::*;
pub use resource::*;
