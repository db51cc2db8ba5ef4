
use crate::model::{LogicalNode, MarkKind, MarkRange};
use crate::store::MemoryStore;

/// Route engine logs through the test harness; safe to call from every test.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// One paragraph `p1` holding text node `t1` = "Hello World" with "World" bold.
pub fn hello_world() -> MemoryStore {
    let mut store = MemoryStore::new();
    store
        .append_paragraph(
            "p1",
            "paragraph",
            LogicalNode::text("t1", "Hello World").with_marks(vec![MarkRange::of(MarkKind::Bold, 6, 11)]),
        )
        .unwrap();
    store
}

/// Paragraphs `p1`/`t1` = "Hello" and `p2`/`t2` = "World".
pub fn two_paragraphs() -> MemoryStore {
    let mut store = MemoryStore::new();
    store
        .append_paragraph("p1", "paragraph", LogicalNode::text("t1", "Hello"))
        .unwrap();
    store
        .append_paragraph("p2", "paragraph", LogicalNode::text("t2", "World"))
        .unwrap();
    store
}
