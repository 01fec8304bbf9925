//! Entity co-occurrence graph ranking.
//!
//! Paragraphs are nodes of an undirected graph. Two paragraphs are joined by an
//! edge weighted with the number of distinct entities mentioned in both. A
//! weighted PageRank over that graph orders the paragraphs.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;

use crate::config::RankingConfig;
use crate::interval::IntervalTree;
use crate::span::TextSpan;

use super::ParagraphRanker;

/// Default [`ParagraphRanker`]: weighted PageRank over shared entities.
#[derive(Debug, Clone)]
pub struct EntityGraphRanker {
    damping: f64,
    iterations: usize,
}

impl Default for EntityGraphRanker {
    fn default() -> Self {
        Self::from_config(&RankingConfig::default())
    }
}

impl EntityGraphRanker {
    pub fn new(damping: f64, iterations: usize) -> Self {
        Self { damping, iterations }
    }

    pub fn from_config(config: &RankingConfig) -> Self {
        Self::new(config.damping, config.iterations)
    }

    /// Distinct entities with a mention lying inside each paragraph.
    ///
    /// A mention that straddles a paragraph boundary counts for neither side.
    pub fn paragraph_entities(
        paragraphs: &[TextSpan],
        mention_groups: &[Vec<TextSpan>],
    ) -> Vec<BTreeSet<usize>> {
        let mentions: IntervalTree<usize> = mention_groups
            .iter()
            .enumerate()
            .flat_map(|(entity, spans)| spans.iter().filter(|s| s.is_valid()).map(move |s| (*s, entity)))
            .collect();

        paragraphs
            .iter()
            .map(|p| {
                if !p.is_valid() {
                    return BTreeSet::new();
                }
                mentions
                    .overlapping(*p)
                    .into_iter()
                    .filter(|(mention, _)| p.contains(mention))
                    .map(|(_, e)| *e)
                    .collect()
            })
            .collect()
    }

    /// Co-occurrence graph; node `i` is paragraph `i`.
    pub fn build_graph(entity_sets: &[BTreeSet<usize>]) -> UnGraph<usize, f64> {
        let mut graph = UnGraph::with_capacity(entity_sets.len(), 0);
        let nodes: Vec<NodeIndex> = (0..entity_sets.len()).map(|i| graph.add_node(i)).collect();

        for (i, a) in entity_sets.iter().enumerate() {
            if a.is_empty() {
                continue;
            }
            for (j, b) in entity_sets.iter().enumerate().skip(i + 1) {
                let shared = a.intersection(b).count();
                if shared > 0 {
                    graph.add_edge(nodes[i], nodes[j], shared as f64);
                }
            }
        }
        graph
    }

    /// Weighted PageRank. Isolated nodes spread their score uniformly.
    pub fn scores(&self, graph: &UnGraph<usize, f64>) -> Vec<f64> {
        let n = graph.node_count();
        if n == 0 {
            return Vec::new();
        }

        let mut strength = vec![0.0_f64; n];
        for edge in graph.edge_references() {
            strength[edge.source().index()] += *edge.weight();
            strength[edge.target().index()] += *edge.weight();
        }

        let uniform = 1.0 / n as f64;
        let mut rank = vec![uniform; n];
        for _ in 0..self.iterations {
            let dangling: f64 = (0..n).filter(|&i| strength[i] == 0.0).map(|i| rank[i]).sum();
            let base = (1.0 - self.damping) * uniform + self.damping * dangling * uniform;
            let mut next = vec![base; n];

            for edge in graph.edge_references() {
                let (a, b) = (edge.source().index(), edge.target().index());
                let w = *edge.weight();
                next[b] += self.damping * rank[a] * w / strength[a];
                next[a] += self.damping * rank[b] * w / strength[b];
            }
            rank = next;
        }
        rank
    }
}

impl ParagraphRanker for EntityGraphRanker {
    fn rank(
        &self,
        _chapter_text: &str,
        paragraphs: &[TextSpan],
        mention_groups: &[Vec<TextSpan>],
        target_count: usize,
    ) -> BTreeMap<usize, BTreeSet<usize>> {
        if paragraphs.is_empty() || target_count == 0 {
            return BTreeMap::new();
        }

        let entity_sets = Self::paragraph_entities(paragraphs, mention_groups);
        let graph = Self::build_graph(&entity_sets);
        let scores = self.scores(&graph);

        let mut order: Vec<usize> = (0..paragraphs.len()).collect();
        order.sort_by(|&a, &b| {
            scores[b]
                .partial_cmp(&scores[a])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });

        tracing::trace!(
            paragraphs = paragraphs.len(),
            edges = graph.edge_count(),
            target_count,
            "ranked paragraphs"
        );

        order
            .into_iter()
            .take(target_count)
            .map(|i| (i, entity_sets[i].clone()))
            .collect()
    }
}
