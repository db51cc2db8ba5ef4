use std::cmp::Ordering;
use std::collections::HashMap;

use crate::model::NodeId;
use crate::surface::{SurfaceKey, SurfaceTree};

/// Maps a contiguous slice of a logical node's text to one backing text span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    pub span_key: SurfaceKey,
    pub start: usize,
    pub end: usize,
}

impl Run {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunIndexOptions {
    /// Also build the span → run reverse map.
    pub reverse_map: bool,
}

/// Flattened view of the text spans backing one logical node.
///
/// Built on demand and never cached: the host mutates spans behind our back,
/// so a stale index would silently corrupt offset math.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunIndex {
    pub container: SurfaceKey,
    pub runs: Vec<Run>,
    pub total: usize,
    pub by_backing_span: Option<HashMap<SurfaceKey, usize>>,
}

impl RunIndex {
    /// Collects the text runs under `container` in document order.
    ///
    /// Decoration subtrees are skipped, as are nested containers carrying a
    /// node identity other than `node_id` (defaulting to the container's own).
    pub fn build<T: SurfaceTree + ?Sized>(
        surface: &T,
        container: SurfaceKey,
        node_id: Option<&NodeId>,
        opts: RunIndexOptions,
    ) -> Self {
        let boundary = node_id.cloned().or_else(|| surface.node_identity(container));
        let mut runs = Vec::new();
        let mut total = 0;
        let mut stack: Vec<SurfaceKey> = surface.children(container).iter().rev().copied().collect();

        while let Some(key) = stack.pop() {
            if surface.is_decoration(key) {
                continue;
            }
            if let Some(identity) = surface.node_identity(key)
                && Some(&identity) != boundary.as_ref()
            {
                continue;
            }
            if let Some(text) = surface.text(key) {
                runs.push(Run {
                    span_key: key,
                    start: total,
                    end: total + text.len(),
                });
                total += text.len();
                continue;
            }
            stack.extend(surface.children(key).iter().rev().copied());
        }

        let by_backing_span = opts.reverse_map.then(|| {
            runs.iter()
                .enumerate()
                .map(|(index, run)| (run.span_key, index))
                .collect()
        });

        Self {
            container,
            runs,
            total,
            by_backing_span,
        }
    }

    /// The concatenated text of all runs.
    pub fn text<T: SurfaceTree + ?Sized>(&self, surface: &T) -> String {
        let mut out = String::with_capacity(self.total);
        for run in &self.runs {
            if let Some(text) = surface.text(run.span_key) {
                out.push_str(text);
            }
        }
        out
    }

    pub fn run_for(&self, span: SurfaceKey) -> Option<&Run> {
        match &self.by_backing_span {
            Some(map) => map.get(&span).map(|index| &self.runs[*index]),
            None => self.runs.iter().find(|run| run.span_key == span),
        }
    }

    /// Converts a per-span offset into an offset in the node's flattened text.
    ///
    /// Offsets in unknown spans snap to the nearest run boundary by document
    /// order. For element endpoints `local` is a child index, as on the host.
    /// The result is always within `[0, total]`.
    pub fn to_global_offset<T: SurfaceTree + ?Sized>(&self, surface: &T, span: SurfaceKey, local: usize) -> usize {
        if let Some(run) = self.run_for(span) {
            return run.start + local.min(run.len());
        }

        let offset = if surface.text(span).is_none() {
            let children = surface.children(span);
            match children.get(local) {
                Some(&target) => self.first_start_at_or_after(surface, target),
                None => self
                    .runs
                    .iter()
                    .rev()
                    .find(|run| {
                        surface.contains(span, run.span_key)
                            || surface.compare_order(run.span_key, span) == Ordering::Less
                    })
                    .map_or(0, |run| run.end),
            }
        } else {
            self.first_start_at_or_after(surface, span)
        };
        offset.min(self.total)
    }

    /// Maps a global offset back to `(span, local offset)`.
    ///
    /// At a boundary between two runs the earlier run wins, so a caret after
    /// styled text keeps that style.
    pub fn locate(&self, global: usize) -> Option<(SurfaceKey, usize)> {
        let global = global.min(self.total);
        self.runs
            .iter()
            .find(|run| run.start <= global && global <= run.end)
            .map(|run| (run.span_key, global - run.start))
    }

    fn first_start_at_or_after<T: SurfaceTree + ?Sized>(&self, surface: &T, target: SurfaceKey) -> usize {
        self.runs
            .iter()
            .find(|run| surface.compare_order(run.span_key, target) != Ordering::Less)
            .map_or(self.total, |run| run.start)
    }
}

/// Global offset for a surface point inside `container`, clamped to the runs.
pub fn convert_offset_with_runs<T: SurfaceTree + ?Sized>(
    surface: &T,
    container: SurfaceKey,
    span: SurfaceKey,
    local: usize,
) -> usize {
    RunIndex::build(surface, container, None, RunIndexOptions::default()).to_global_offset(surface, span, local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{DECORATOR_ATTR, MemorySurface, NODE_ID_ATTR, TEXT_CONTAINER_ATTR};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    struct Fixture {
        surface: MemorySurface,
        span: SurfaceKey,
        hello: SurfaceKey,
        strong: SurfaceKey,
        world: SurfaceKey,
        deco: SurfaceKey,
    }

    /// `<span t1>"Hello "<strong>"World"</strong><i decorator>"!!"</i></span>`
    fn fixture() -> Fixture {
        let mut surface = MemorySurface::new();
        let root = surface.root();
        let span = surface.element(root, "span", &[(NODE_ID_ATTR, "t1"), (TEXT_CONTAINER_ATTR, "true")]);
        let hello = surface.text_node(span, "Hello ");
        let strong = surface.element(span, "strong", &[]);
        let world = surface.text_node(strong, "World");
        let deco = surface.element(span, "i", &[(DECORATOR_ATTR, "true")]);
        surface.text_node(deco, "!!");
        Fixture {
            surface,
            span,
            hello,
            strong,
            world,
            deco,
        }
    }

    #[test]
    fn runs_are_contiguous_and_skip_decorations() {
        let f = fixture();
        let index = RunIndex::build(&f.surface, f.span, None, RunIndexOptions::default());

        assert_eq!(
            index.runs,
            vec![
                Run {
                    span_key: f.hello,
                    start: 0,
                    end: 6
                },
                Run {
                    span_key: f.world,
                    start: 6,
                    end: 11
                },
            ]
        );
        assert_eq!(index.total, 11);
        assert_eq!(index.text(&f.surface), "Hello World");
        for pair in index.runs.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn nested_foreign_identity_is_excluded() {
        let mut f = fixture();
        let nested = f.surface.element(f.span, "span", &[(NODE_ID_ATTR, "t2")]);
        f.surface.text_node(nested, "other");

        let index = RunIndex::build(&f.surface, f.span, None, RunIndexOptions::default());
        assert_eq!(index.total, 11);
    }

    #[test]
    fn reverse_map_matches_linear_lookup() {
        let f = fixture();
        let index = RunIndex::build(&f.surface, f.span, None, RunIndexOptions { reverse_map: true });

        assert_eq!(index.by_backing_span.as_ref().map(HashMap::len), Some(2));
        assert_eq!(index.run_for(f.world).map(|run| run.start), Some(6));
    }

    #[rstest]
    #[case::inside_first_run(0, 3, 3)]
    #[case::inside_second_run(1, 2, 8)]
    #[case::local_past_run_end_clamps(1, 99, 11)]
    fn global_offset_for_text_spans(#[case] which: usize, #[case] local: usize, #[case] expected: usize) {
        let f = fixture();
        let index = RunIndex::build(&f.surface, f.span, None, RunIndexOptions::default());
        let span = [f.hello, f.world][which];

        assert_eq!(index.to_global_offset(&f.surface, span, local), expected);
    }

    #[test]
    fn element_endpoints_use_child_index() {
        let f = fixture();
        let index = RunIndex::build(&f.surface, f.span, None, RunIndexOptions::default());

        // before child 1 (<strong>) of the container
        assert_eq!(index.to_global_offset(&f.surface, f.span, 1), 6);
        // after the last child
        assert_eq!(index.to_global_offset(&f.surface, f.span, 3), 11);
        // inside <strong>, before its only child
        assert_eq!(index.to_global_offset(&f.surface, f.strong, 0), 6);
    }

    #[test]
    fn unknown_spans_snap_to_run_boundaries() {
        let f = fixture();
        let index = RunIndex::build(&f.surface, f.span, None, RunIndexOptions::default());
        let deco_text = f.surface.children(f.deco)[0];

        // decoration text after all runs snaps to the end
        assert_eq!(index.to_global_offset(&f.surface, deco_text, 1), 11);
    }

    #[test]
    fn offsets_never_exceed_total() {
        let f = fixture();
        let index = RunIndex::build(&f.surface, f.span, None, RunIndexOptions::default());
        for key in [f.span, f.hello, f.strong, f.world, f.deco] {
            for local in 0..20 {
                assert!(index.to_global_offset(&f.surface, key, local) <= index.total);
            }
        }
    }

    #[test]
    fn locate_prefers_earlier_run_at_boundaries() {
        let f = fixture();
        let index = RunIndex::build(&f.surface, f.span, None, RunIndexOptions::default());

        assert_eq!(index.locate(6), Some((f.hello, 6)));
        assert_eq!(index.locate(7), Some((f.world, 1)));
        assert_eq!(index.locate(50), Some((f.world, 5)));
    }

    #[test]
    fn empty_container_has_no_runs() {
        let mut surface = MemorySurface::new();
        let root = surface.root();
        let span = surface.element(root, "span", &[(NODE_ID_ATTR, "t1")]);
        let index = RunIndex::build(&surface, span, None, RunIndexOptions::default());

        assert_eq!(index.total, 0);
        assert_eq!(index.locate(0), None);
        assert_eq!(index.to_global_offset(&surface, span, 0), 0);
    }
}
