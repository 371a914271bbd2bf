//! PDF assembly

mod builder;
mod outline;
mod xobject;

pub use builder::{BuiltDocument, DocumentBuilder};
pub use outline::{display_title, plan_outline, plan_outline_within, OutlineItem};
