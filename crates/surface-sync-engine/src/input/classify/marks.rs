//! C4: style elements or inline styles the host added around model text.

use std::sync::OnceLock;

use regex::Regex;

use crate::editing::run_index::{RunIndex, RunIndexOptions};
use crate::input::classify::{
    ChangeCase, ClassifiedChange, MarkAction, MarkSignal, SignalSource, text_container,
};
use crate::model::{MarkKind, Span};
use crate::store::NodeStore;
use crate::surface::{MutationKind, MutationRecord, SurfaceKey, SurfaceTree};

pub(super) fn mark_change<T, S>(
    surface: &T,
    store: &S,
    mutations: &[MutationRecord],
) -> Option<ClassifiedChange>
where
    T: SurfaceTree + ?Sized,
    S: NodeStore + ?Sized,
{
    let mut signals: Vec<MarkSignal> = Vec::new();
    // an unwrapped element's text comes back as added nodes
    let restored: Vec<SurfaceKey> = mutations
        .iter()
        .flat_map(|mutation| mutation.touched_children().0.iter().copied())
        .collect();

    for mutation in mutations {
        match &mutation.kind {
            MutationKind::Attributes { .. } => {
                if surface.node_identity(mutation.target).is_none() {
                    let found = Found::new(mutation.target, mutation.target, MarkAction::Add);
                    collect(surface, store, found, &restored, &mut signals);
                }
            }
            MutationKind::ChildList { added, removed } => {
                for &key in added {
                    let found = Found::new(key, key, MarkAction::Add);
                    collect(surface, store, found, &restored, &mut signals);
                }
                for &key in removed {
                    let found = Found::new(key, mutation.target, MarkAction::Remove);
                    collect(surface, store, found, &restored, &mut signals);
                }
            }
            MutationKind::CharacterData => {}
        }
    }

    let first = signals.first()?;
    let mut change = ClassifiedChange::new(ChangeCase::C4, mutations);
    change.node_id = Some(first.node_id.clone());
    change.metadata.marks = signals;
    Some(change)
}

/// An added, removed or restyled element and where to attribute it.
struct Found {
    element: SurfaceKey,
    /// Connected node whose enclosing text node receives the signal.
    anchor: SurfaceKey,
    action: MarkAction,
}

impl Found {
    fn new(element: SurfaceKey, anchor: SurfaceKey, action: MarkAction) -> Self {
        Self {
            element,
            anchor,
            action,
        }
    }
}

/// Pushes the signals the element carries, attributed to the text node that
/// encloses its anchor.
fn collect<T, S>(
    surface: &T,
    store: &S,
    found: Found,
    restored: &[SurfaceKey],
    signals: &mut Vec<MarkSignal>,
) where
    T: SurfaceTree + ?Sized,
    S: NodeStore + ?Sized,
{
    let Found {
        element,
        anchor,
        action,
    } = found;
    if surface.tag(element).is_none()
        || surface.node_identity(element).is_some()
        || surface.is_decoration(element)
    {
        return;
    }
    let found = element_signals(surface, element);
    if found.is_empty() {
        return;
    }
    let Some((container, node)) = text_container(surface, store, anchor) else {
        return;
    };

    let runs = RunIndex::build(surface, container.key, Some(&node.id), RunIndexOptions::default());
    let wrapped = [element];
    let covered: &[SurfaceKey] = match action {
        MarkAction::Add => &wrapped,
        MarkAction::Remove => restored,
    };
    let span = covered_span(surface, &runs, covered);

    for (mark, source) in found {
        let signal = MarkSignal {
            node_id: node.id.clone(),
            mark,
            source,
            action,
            span,
        };
        if !signals.contains(&signal) {
            signals.push(signal);
        }
    }
}

/// Smallest span holding every run below any of `keys`.
fn covered_span<T: SurfaceTree + ?Sized>(
    surface: &T,
    runs: &RunIndex,
    keys: &[SurfaceKey],
) -> Option<Span> {
    let mut covered = runs
        .runs
        .iter()
        .filter(|run| keys.iter().any(|key| surface.contains(*key, run.span_key)));
    let first = covered.next()?;
    let last = covered.last().unwrap_or(first);
    Some(Span::new(first.start, last.end))
}

fn element_signals<T: SurfaceTree + ?Sized>(
    surface: &T,
    element: SurfaceKey,
) -> Vec<(MarkKind, SignalSource)> {
    let mut found = Vec::new();
    if let Some(mark) = surface.tag(element).and_then(tag_mark) {
        found.push((mark, SignalSource::Tag));
    }
    if let Some(style) = surface.attribute(element, "style") {
        for mark in style_marks(style) {
            if !found.iter().any(|(existing, _)| *existing == mark) {
                found.push((mark, SignalSource::Style));
            }
        }
    }
    found
}

fn tag_mark(tag: &str) -> Option<MarkKind> {
    match tag {
        "b" | "strong" => Some(MarkKind::Bold),
        "i" | "em" => Some(MarkKind::Italic),
        "u" | "ins" => Some(MarkKind::Underline),
        "s" | "strike" | "del" => Some(MarkKind::Strikethrough),
        _ => None,
    }
}

fn style_marks(style: &str) -> Vec<MarkKind> {
    let mut marks = Vec::new();
    if font_weight_regex().is_match(style) {
        marks.push(MarkKind::Bold);
    }
    if font_style_regex().is_match(style) {
        marks.push(MarkKind::Italic);
    }
    if let Some(captures) = text_decoration_regex().captures(style) {
        let value = captures.get(1).map_or("", |value| value.as_str());
        if value.contains("underline") {
            marks.push(MarkKind::Underline);
        }
        if value.contains("line-through") {
            marks.push(MarkKind::Strikethrough);
        }
    }
    marks
}

fn font_weight_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:^|;)\s*font-weight\s*:\s*(?:bold|bolder|[6-9]00)\s*(?:;|$)")
            .expect("font-weight pattern is valid")
    })
}

fn font_style_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:^|;)\s*font-style\s*:\s*italic\s*(?:;|$)")
            .expect("font-style pattern is valid")
    })
}

fn text_decoration_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:^|;)\s*text-decoration(?:-line)?\s*:\s*([^;]*)")
            .expect("text-decoration pattern is valid")
    })
}
