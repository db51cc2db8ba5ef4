//! Document model types shared by every stage of the pipeline.

pub mod mark;
pub mod node;
pub mod range;
pub mod selection;
pub mod span;

pub use mark::{Annotation, MarkKind, MarkRange, normalize_marks};
pub use node::{LogicalNode, NodeGroup, NodeId, Schema};
pub use range::{ContentRange, Position};
pub use selection::{Direction, ModelSelection};
pub use span::{Span, floor_char_boundary};
