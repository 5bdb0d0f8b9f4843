mod policy;
mod queue;
mod request;

pub use policy::*;
pub use queue::*;
pub use request::*;
