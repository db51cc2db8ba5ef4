// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
use surface_sync_engine::{LogicalNode, MarkKind, MarkRange, MemoryStore};

#[allow(dead_code)]
pub fn generate_text(size: usize) -> String {
    "The quick brown fox jumps over the lazy dog. ".repeat(size)
}

/// `paragraphs` blocks `p{i}`/`t{i}`, every other one carrying a bold run.
#[allow(dead_code)]
pub fn generate_store(paragraphs: usize, sentences: usize) -> MemoryStore {
    let mut store = MemoryStore::new();
    for i in 0..paragraphs {
        let text = generate_text(sentences);
        let mut node = LogicalNode::text(format!("t{i}"), text);
        if i % 2 == 0 {
            node = node.with_marks(vec![MarkRange::of(MarkKind::Bold, 4, 9)]);
        }
        store
            .append_paragraph(format!("p{i}"), "paragraph", node)
            .unwrap();
    }
    store
}
