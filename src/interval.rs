//! Interval tree over [`TextSpan`]s.
//!
//! An AVL tree keyed by `(start, end)` where every node also stores the maximum
//! `end` found in its subtree. That augmentation lets an overlap query discard a
//! whole subtree whenever nothing in it reaches past the query's start, giving
//! O(log n) "find any overlap" and O(log n + k) "find all overlaps".
//!
//! A tree is meant to be scoped to a single chapter: build it, query it, drop it.

use crate::span::TextSpan;

type Link<T> = Option<Box<Node<T>>>;

#[derive(Debug, Clone)]
struct Node<T> {
    span: TextSpan,
    value: T,
    max_end: usize,
    height: u8,
    left: Link<T>,
    right: Link<T>,
}

impl<T> Node<T> {
    fn leaf(span: TextSpan, value: T) -> Box<Self> {
        Box::new(Self {
            span,
            value,
            max_end: span.end,
            height: 1,
            left: None,
            right: None,
        })
    }

    fn update(&mut self) {
        self.height = 1 + height(&self.left).max(height(&self.right));
        self.max_end = self
            .span
            .end
            .max(max_end(&self.left))
            .max(max_end(&self.right));
    }
}

fn height<T>(link: &Link<T>) -> u8 {
    link.as_ref().map_or(0, |n| n.height)
}

fn max_end<T>(link: &Link<T>) -> usize {
    link.as_ref().map_or(0, |n| n.max_end)
}

fn rotate_right<T>(mut node: Box<Node<T>>) -> Box<Node<T>> {
    match node.left.take() {
        Some(mut pivot) => {
            node.left = pivot.right.take();
            node.update();
            pivot.right = Some(node);
            pivot.update();
            pivot
        }
        None => node,
    }
}

fn rotate_left<T>(mut node: Box<Node<T>>) -> Box<Node<T>> {
    match node.right.take() {
        Some(mut pivot) => {
            node.right = pivot.left.take();
            node.update();
            pivot.left = Some(node);
            pivot.update();
            pivot
        }
        None => node,
    }
}

fn rebalance<T>(mut node: Box<Node<T>>) -> Box<Node<T>> {
    node.update();
    let balance = i16::from(height(&node.left)) - i16::from(height(&node.right));

    if balance > 1 {
        if let Some(left) = node.left.take() {
            node.left = Some(if height(&left.right) > height(&left.left) {
                rotate_left(left)
            } else {
                left
            });
        }
        rotate_right(node)
    } else if balance < -1 {
        if let Some(right) = node.right.take() {
            node.right = Some(if height(&right.left) > height(&right.right) {
                rotate_right(right)
            } else {
                right
            });
        }
        rotate_left(node)
    } else {
        node
    }
}

fn insert_at<T>(link: Link<T>, span: TextSpan, value: T) -> Box<Node<T>> {
    match link {
        None => Node::leaf(span, value),
        Some(mut node) => {
            if (span.start, span.end) < (node.span.start, node.span.end) {
                node.left = Some(insert_at(node.left.take(), span, value));
            } else {
                node.right = Some(insert_at(node.right.take(), span, value));
            }
            rebalance(node)
        }
    }
}

fn collect_overlaps<'a, T>(link: &'a Link<T>, query: TextSpan, out: &mut Vec<(TextSpan, &'a T)>) {
    let Some(node) = link.as_deref() else {
        return;
    };
    if node.max_end <= query.start {
        return;
    }
    collect_overlaps(&node.left, query, out);
    if node.span.overlaps(&query) {
        out.push((node.span, &node.value));
    }
    if node.span.start < query.end {
        collect_overlaps(&node.right, query, out);
    }
}

/// Balanced interval tree mapping spans to payloads.
#[derive(Debug, Clone)]
pub struct IntervalTree<T> {
    root: Link<T>,
    len: usize,
}

impl<T> Default for IntervalTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> IntervalTree<T> {
    pub fn new() -> Self {
        Self { root: None, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop every stored span.
    pub fn clear(&mut self) {
        self.root = None;
        self.len = 0;
    }

    /// Insert a span with its payload. Amortized O(log n).
    ///
    /// A span with `start >= end` is a caller bug: it panics in debug builds and
    /// is dropped (returning `false`) in release builds.
    pub fn insert(&mut self, span: TextSpan, value: T) -> bool {
        debug_assert!(span.is_valid(), "interval tree received empty span {span}");
        if !span.is_valid() {
            tracing::warn!(%span, "dropping empty or inverted span");
            return false;
        }
        self.root = Some(insert_at(self.root.take(), span, value));
        self.len += 1;
        true
    }

    /// Return one stored span overlapping `query`, or `None` if none does.
    ///
    /// Which span is returned when several overlap is an artifact of the tree
    /// shape; callers must only rely on presence or absence.
    pub fn overlap_search(&self, query: TextSpan) -> Option<(TextSpan, &T)> {
        if !query.is_valid() {
            return None;
        }
        let mut cursor = self.root.as_deref();
        while let Some(node) = cursor {
            if node.span.overlaps(&query) {
                return Some((node.span, &node.value));
            }
            cursor = match node.left.as_deref() {
                Some(left) if left.max_end > query.start => Some(left),
                _ => node.right.as_deref(),
            };
        }
        None
    }

    /// Every stored span overlapping `query`, ordered by `(start, end)`.
    pub fn overlapping(&self, query: TextSpan) -> Vec<(TextSpan, &T)> {
        let mut out = Vec::new();
        if query.is_valid() {
            collect_overlaps(&self.root, query, &mut out);
        }
        out
    }

    /// In-order traversal.
    pub fn iter(&self) -> Iter<'_, T> {
        let mut iter = Iter { stack: Vec::new() };
        iter.push_left(self.root.as_deref());
        iter
    }

    #[cfg(test)]
    fn height(&self) -> u8 {
        height(&self.root)
    }
}

impl<T> FromIterator<(TextSpan, T)> for IntervalTree<T> {
    fn from_iter<I: IntoIterator<Item = (TextSpan, T)>>(iter: I) -> Self {
        let mut tree = IntervalTree::new();
        for (span, value) in iter {
            tree.insert(span, value);
        }
        tree
    }
}

/// In-order iterator over an [`IntervalTree`].
pub struct Iter<'a, T> {
    stack: Vec<&'a Node<T>>,
}

impl<'a, T> Iter<'a, T> {
    fn push_left(&mut self, mut node: Option<&'a Node<T>>) {
        while let Some(n) = node {
            self.stack.push(n);
            node = n.left.as_deref();
        }
    }
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (TextSpan, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left(node.right.as_deref());
        Some((node.span, &node.value))
    }
}
