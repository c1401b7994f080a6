//! Graph generator: bounded-hop relationship expansion
//!
//! Expansion starts from the query's resolved entities, or from seed nodes handed in by the
//! engine (the top fused candidates). Each reached node is boosted by the product of edge
//! confidences along its best path times the hop factor (1.0 at hop 1, 0.6 at hop 2). Nothing
//! beyond `max_hops` (at most 2) is ever reached.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use super::{CandidateGenerator, Candidate, Evidence, GenerationInput, GeneratorKind, clamp_unit};
use crate::Result;
use crate::config::GraphExpansionConfig;
use crate::models::{GraphEdge, NodeKind, NodeRef, RelationType};
use crate::query::{ResolvedEntity, RouterMode};
use crate::storage::{CacheService, WorkspaceStore};

/// Relations followed per router mode
pub fn allowed_relations(mode: RouterMode) -> &'static [RelationType] {
    use RelationType::*;
    match mode {
        RouterMode::Knowledge => &[References, Mentions, PartOf, DependsOn, Fixes, Resolves],
        RouterMode::Actor => &[Authored, Reviewed, AssignedTo, Mentions],
        RouterMode::Temporal => &[Triggered, Fixes, Resolves, References, PartOf],
        RouterMode::Neural => &[Triggered, Fixes, Resolves, References, Mentions, PartOf],
        RouterMode::Hybrid => &[
            Authored, Reviewed, AssignedTo, Mentions, References, Fixes, Resolves, Triggered,
            DependsOn, PartOf,
        ],
    }
}

/// Adjacency reads through the cache; edge writes invalidate both endpoints
#[derive(Debug, Clone)]
pub struct GraphService {
    store: Arc<dyn WorkspaceStore>,
    cache: Arc<CacheService>,
}

impl GraphService {
    pub fn new(store: Arc<dyn WorkspaceStore>, cache: Arc<CacheService>) -> Self {
        Self { store, cache }
    }

    /// Edges touching `node` in either direction
    pub async fn neighbors(&self, workspace_id: &str, node: &NodeRef) -> Result<Vec<GraphEdge>> {
        let key = (workspace_id.to_string(), node.clone());
        if let Some(edges) = self.cache.adjacency.get(&key).await {
            return Ok(edges);
        }
        let edges = self.store.edges_for(workspace_id, node).await?;
        self.cache.adjacency.put(key, edges.clone()).await;
        Ok(edges)
    }

    pub async fn add_edge(&self, edge: GraphEdge) -> Result<GraphEdge> {
        let edge = self.store.put_edge(edge).await?;
        self.cache.invalidate_edge(&edge).await;
        debug!(edge_id = %edge.id, relation = %edge.relation, "Graph edge added");
        Ok(edge)
    }
}

/// Best path found to a node
#[derive(Debug, Clone)]
struct Reached {
    boost: f32,
    confidence: f32,
    hops: usize,
    path: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct GraphGenerator {
    graph: Arc<GraphService>,
    store: Arc<dyn WorkspaceStore>,
    config: GraphExpansionConfig,
}

impl GraphGenerator {
    pub fn new(
        graph: Arc<GraphService>,
        store: Arc<dyn WorkspaceStore>,
        config: GraphExpansionConfig,
    ) -> Self {
        Self {
            graph,
            store,
            config,
        }
    }

    /// Breadth-first expansion from `seeds`, keeping the best boost per reached node
    async fn expand(
        &self,
        workspace_id: &str,
        mode: RouterMode,
        seeds: &[(NodeRef, f32)],
    ) -> Result<HashMap<NodeRef, Reached>> {
        let allowed = allowed_relations(mode);
        let max_hops = self.config.max_hops.min(2);
        let seed_nodes: HashSet<&NodeRef> = seeds.iter().map(|(n, _)| n).collect();

        let mut reached: HashMap<NodeRef, Reached> = HashMap::new();
        let mut visited: HashSet<NodeRef> = seeds.iter().map(|(n, _)| n.clone()).collect();
        let mut frontier: Vec<(NodeRef, f32, Vec<String>)> = seeds
            .iter()
            .map(|(n, c)| (n.clone(), *c, vec![n.to_string()]))
            .collect();

        for hop in 1..=max_hops {
            let factor = self.config.hop_factor(hop);
            let mut next = Vec::new();
            for (node, confidence, path) in &frontier {
                let mut edges: Vec<GraphEdge> = self
                    .graph
                    .neighbors(workspace_id, node)
                    .await?
                    .into_iter()
                    .filter(|e| allowed.contains(&e.relation))
                    .collect();
                edges.sort_by(|a, b| {
                    a.hop_cost
                        .total_cmp(&b.hop_cost)
                        .then_with(|| b.confidence.total_cmp(&a.confidence))
                        .then_with(|| a.id.cmp(&b.id))
                });
                edges.truncate(self.config.max_fan_out);

                for edge in edges {
                    let Some(other) = edge.other_end(node) else {
                        continue;
                    };
                    if seed_nodes.contains(other) {
                        continue;
                    }
                    let path_confidence = confidence * clamp_unit(edge.confidence);
                    let boost = path_confidence * factor;
                    let mut path = path.clone();
                    path.push(format!("-[{}]-> {}", edge.relation, other));

                    let better = reached.get(other).is_none_or(|r| boost > r.boost);
                    if better {
                        reached.insert(
                            other.clone(),
                            Reached {
                                boost,
                                confidence: path_confidence,
                                hops: hop,
                                path: path.clone(),
                            },
                        );
                    }
                    if visited.insert(other.clone()) {
                        next.push((other.clone(), path_confidence, path));
                    }
                }
            }
            frontier = next;
        }
        Ok(reached)
    }

    /// Turn reached content nodes into candidates, applying filters
    async fn materialize(
        &self,
        input: &GenerationInput<'_>,
        reached: HashMap<NodeRef, Reached>,
    ) -> Result<Vec<Candidate>> {
        let workspace_id = input.query.workspace_id.as_str();
        let ids_of = |kind: NodeKind| -> Vec<String> {
            let mut ids: Vec<String> = reached
                .keys()
                .filter(|n| n.kind == kind)
                .map(|n| n.id.clone())
                .collect();
            ids.sort();
            ids
        };

        let mut candidates = Vec::new();
        for chunk in self
            .store
            .get_chunks(workspace_id, &ids_of(NodeKind::Chunk))
            .await?
        {
            if input.filters.matches_chunk(&chunk) {
                candidates.push((
                    NodeRef::new(NodeKind::Chunk, &chunk.id),
                    Candidate::chunk(&chunk, GeneratorKind::Graph),
                ));
            }
        }
        for observation in self
            .store
            .get_observations(workspace_id, &ids_of(NodeKind::Observation))
            .await?
        {
            if input.filters.matches_observation(&observation) {
                candidates.push((
                    NodeRef::new(NodeKind::Observation, &observation.id),
                    Candidate::observation(&observation, GeneratorKind::Graph),
                ));
            }
        }
        for summary in self
            .store
            .get_summaries(workspace_id, &ids_of(NodeKind::Summary))
            .await?
        {
            if input.filters.matches_summary(&summary) {
                candidates.push((
                    NodeRef::new(NodeKind::Summary, &summary.id),
                    Candidate::summary(&summary, GeneratorKind::Graph),
                ));
            }
        }

        let mut out: Vec<Candidate> = candidates
            .into_iter()
            .filter_map(|(node, mut candidate)| {
                let r = reached.get(&node)?;
                candidate.scores.graph = Some(clamp_unit(r.boost));
                Some(candidate.with_evidence(Evidence::GraphPath {
                    path: r.path.clone(),
                    hops: r.hops,
                    confidence: r.confidence,
                }))
            })
            .collect();
        out.sort_by(|a, b| {
            b.scores
                .graph
                .unwrap_or(0.0)
                .total_cmp(&a.scores.graph.unwrap_or(0.0))
                .then_with(|| a.id.cmp(&b.id))
        });
        out.truncate(input.limit);
        Ok(out)
    }
}

#[async_trait]
impl CandidateGenerator for GraphGenerator {
    fn kind(&self) -> GeneratorKind {
        GeneratorKind::Graph
    }

    async fn generate(&self, input: GenerationInput<'_>) -> Result<Vec<Candidate>> {
        let query = input.query;
        let mut seeds: Vec<(NodeRef, f32)> = query
            .entities
            .iter()
            .map(|entity| {
                let confidence = match entity {
                    ResolvedEntity::Actor { confidence, .. } => *confidence,
                    _ => 1.0,
                };
                (entity.node(), confidence)
            })
            .collect();
        for node in input.seeds {
            if !seeds.iter().any(|(n, _)| n == node) {
                seeds.push((node.clone(), 1.0));
            }
        }
        if seeds.is_empty() {
            return Ok(Vec::new());
        }

        let reached = self.expand(&query.workspace_id, query.mode, &seeds).await?;
        debug!(seeds = seeds.len(), reached = reached.len(), "Graph expansion finished");
        self.materialize(&input, reached).await
    }
}
