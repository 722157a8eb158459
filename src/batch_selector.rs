//! Chooses the subset of valid candidates with the largest total fee.
//!
//! A subset is admissible when it contains every parent of each member and at most one
//! member of each conflict set. Without conflicts and with positive fees the whole batch is
//! the answer. Otherwise an iterative branch and bound over the candidates in topological
//! order finds the optimum, seeded with the greedy selection and bounded by
//! `HandlerConfig`. Its bound counts only the most valuable candidate claiming each output
//! still up for grabs. When the bounds are hit the best subset seen so far is used and the
//! selection is reported as `Greedy`, since it is no longer known to be optimal.
//!
//! Equal totals are resolved in favour of the subset whose sorted transaction ids compare
//! lexicographically smallest.

use crate::{BatchGraph, EngineError, HandlerConfig, TransactionId};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::Instant;

/// Sum of fees of a selection.
pub type TotalFee = i128;

// How often the deadline is looked at, in expanded search nodes, starting with the first.
const DEADLINE_CHECK_INTERVAL: u64 = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionMode {
    /// No conflicts and only positive fees, every candidate is accepted.
    PrecedenceOnly,
    /// The search completed, the selection is optimal.
    Exact,
    /// A bound was hit, the selection is the best one found and may not be optimal.
    Greedy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    order: Vec<usize>,
    total_fee: TotalFee,
    mode: SelectionMode,
}

impl Selection {
    /// Selected nodes in an order in which they can be applied.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn total_fee(&self) -> TotalFee {
        self.total_fee
    }

    pub fn mode(&self) -> SelectionMode {
        self.mode
    }

    pub fn is_optimal(&self) -> bool {
        self.mode != SelectionMode::Greedy
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    Undecided,
    Accepted,
    Rejected,
}

// Per-node decisions, and which claims an accepted node holds.
struct Decisions {
    of: Vec<Decision>,
    held: Vec<bool>,
}

impl Decisions {
    fn new(graph: &BatchGraph) -> Self {
        Self {
            of: vec![Decision::Undecided; graph.len()],
            held: vec![false; graph.claim_count()],
        }
    }

    fn fits(&self, graph: &BatchGraph, node: usize) -> bool {
        graph
            .parents(node)
            .iter()
            .all(|&parent| self.of[parent] == Decision::Accepted)
            && !graph.claims(node).iter().any(|&claim| self.held[claim])
    }

    fn accept(&mut self, graph: &BatchGraph, node: usize) {
        self.of[node] = Decision::Accepted;
        for &claim in graph.claims(node) {
            self.held[claim] = true;
        }
    }

    fn reject(&mut self, graph: &BatchGraph, node: usize) {
        if self.of[node] == Decision::Accepted {
            for &claim in graph.claims(node) {
                self.held[claim] = false;
            }
        }
        self.of[node] = Decision::Rejected;
    }
}

// What the undecided nodes can still add.
struct Outlook<'g> {
    remainder: TotalFee,
    // Smallest id among the nodes that can still be accepted.
    first_open: Option<&'g TransactionId>,
}

// Buffers reused by every bound computation.
struct BoundScratch {
    dead: Vec<bool>,
    best_claimant: Vec<Option<TotalFee>>,
    touched: Vec<usize>,
}

impl BoundScratch {
    fn new(graph: &BatchGraph) -> Self {
        Self {
            dead: vec![false; graph.len()],
            best_claimant: vec![None; graph.claim_count()],
            touched: vec![],
        }
    }
}

struct Frame {
    node: usize,
    accepted: bool,
}

// The best subset found so far.
struct Incumbent {
    fee: TotalFee,
    ids: Vec<TransactionId>,
    nodes: Vec<usize>,
}

impl Incumbent {
    fn new(graph: &BatchGraph, nodes: Vec<usize>) -> Self {
        let fee = nodes.iter().map(|&node| graph.fee(node) as TotalFee).sum();
        let ids = sorted_ids(graph, &nodes);
        Self { fee, ids, nodes }
    }

    fn is_beaten_by(&self, fee: TotalFee, ids: &[TransactionId]) -> bool {
        fee > self.fee || (fee == self.fee && ids < &self.ids[..])
    }
}

enum Search {
    Complete(Incumbent),
    Exhausted(Incumbent),
}

pub struct BatchSelector<'a> {
    graph: &'a BatchGraph,
    config: &'a HandlerConfig,
}

impl<'a> BatchSelector<'a> {
    pub fn new(graph: &'a BatchGraph, config: &'a HandlerConfig) -> Self {
        Self { graph, config }
    }

    pub fn select(&self) -> Result<Selection, EngineError> {
        let order = self.topological_order()?;
        let graph = self.graph;

        if !graph.has_conflicts() && (0..graph.len()).all(|node| graph.fee(node) > 0) {
            return Ok(self.finish(order, SelectionMode::PrecedenceOnly));
        }

        let greedy = Incumbent::new(graph, self.greedy());
        if graph.len() > self.config.max_exact_candidates {
            warn!(
                "Batch of {} exceeds the exact selection limit of {}, selecting greedily",
                graph.len(),
                self.config.max_exact_candidates
            );
            return Ok(self.finish(greedy.nodes, SelectionMode::Greedy));
        }

        match self.branch_and_bound(&order, greedy) {
            Search::Complete(best) => Ok(self.finish(best.nodes, SelectionMode::Exact)),
            Search::Exhausted(best) => {
                warn!(
                    "Search bounds reached for a batch of {}, using the best selection found",
                    graph.len()
                );
                Ok(self.finish(best.nodes, SelectionMode::Greedy))
            }
        }
    }

    fn finish(&self, nodes: Vec<usize>, mode: SelectionMode) -> Selection {
        let mut members = vec![false; self.graph.len()];
        for &node in &nodes {
            members[node] = true;
        }
        let order = self.kahn(&members);
        let total_fee = order
            .iter()
            .map(|&node| self.graph.fee(node) as TotalFee)
            .sum();
        debug!(
            "Selected {} of {} candidates, total fee {} ({:?})",
            order.len(),
            self.graph.len(),
            total_fee,
            mode
        );
        Selection {
            order,
            total_fee,
            mode,
        }
    }

    /// All nodes, parents first, ties broken by ascending transaction id.
    fn topological_order(&self) -> Result<Vec<usize>, EngineError> {
        let order = self.kahn(&vec![true; self.graph.len()]);
        if order.len() == self.graph.len() {
            Ok(order)
        } else {
            Err(EngineError::InconsistentBatch {
                participants: self.cycle_participants(&order),
            })
        }
    }

    // Kahn's algorithm restricted to `members`, always emitting the smallest ready id.
    fn kahn(&self, members: &[bool]) -> Vec<usize> {
        let graph = self.graph;
        let mut pending = (0..graph.len())
            .map(|node| {
                graph
                    .parents(node)
                    .iter()
                    .filter(|&&parent| members[parent])
                    .count()
            })
            .collect::<Vec<_>>();
        let mut ready = (0..graph.len())
            .filter(|&node| members[node] && pending[node] == 0)
            .map(|node| Reverse((*graph.id(node), node)))
            .collect::<BinaryHeap<_>>();
        let mut order = vec![];
        while let Some(Reverse((_, node))) = ready.pop() {
            order.push(node);
            for &child in graph.children(node) {
                if members[child] {
                    pending[child] -= 1;
                    if pending[child] == 0 {
                        ready.push(Reverse((*graph.id(child), child)));
                    }
                }
            }
        }
        order
    }

    // Nodes Kahn's algorithm couldn't order, minus those merely downstream of a cycle.
    fn cycle_participants(&self, ordered: &[usize]) -> Vec<TransactionId> {
        let graph = self.graph;
        let mut stuck = vec![true; graph.len()];
        for &node in ordered {
            stuck[node] = false;
        }
        loop {
            let peeled = (0..graph.len())
                .filter(|&node| {
                    stuck[node] && !graph.children(node).iter().any(|&child| stuck[child])
                })
                .collect::<Vec<_>>();
            if peeled.is_empty() {
                break;
            }
            for node in peeled {
                stuck[node] = false;
            }
        }
        let participants = (0..graph.len())
            .filter(|&node| stuck[node])
            .collect::<Vec<_>>();
        sorted_ids(graph, &participants)
    }

    /// Repeatedly accepts the highest-fee candidate that fits next to those already accepted,
    /// the smaller id first among equal fees. A candidate is eligible once all its parents are.
    fn greedy(&self) -> Vec<usize> {
        let graph = self.graph;
        let rank = |node: usize| (graph.fee(node), Reverse(*graph.id(node)), node);
        let mut pending = (0..graph.len())
            .map(|node| graph.parents(node).len())
            .collect::<Vec<_>>();
        let mut eligible = (0..graph.len())
            .filter(|&node| pending[node] == 0)
            .map(rank)
            .collect::<BinaryHeap<_>>();
        let mut decisions = Decisions::new(graph);
        let mut chosen = vec![];
        while let Some((_, _, node)) = eligible.pop() {
            // Claims only ever get taken, so a candidate that doesn't fit now never will.
            if !decisions.fits(graph, node) {
                continue;
            }
            decisions.accept(graph, node);
            chosen.push(node);
            for &child in graph.children(node) {
                pending[child] -= 1;
                if pending[child] == 0 {
                    eligible.push(rank(child));
                }
            }
        }
        chosen
    }

    // Depth-first over `order`, accepting before rejecting. A node is decided only after all
    // its parents, so admissibility is checked against decisions alone.
    fn branch_and_bound(&self, order: &[usize], mut best: Incumbent) -> Search {
        let graph = self.graph;
        let started = Instant::now();
        let mut decisions = Decisions::new(graph);
        let mut scratch = BoundScratch::new(graph);
        let mut stack: Vec<Frame> = Vec::with_capacity(order.len());
        let mut fee: TotalFee = 0;
        let mut expanded: u64 = 0;

        loop {
            let depth = stack.len();
            let descend = if depth == order.len() {
                let nodes = stack
                    .iter()
                    .filter(|frame| frame.accepted)
                    .map(|frame| frame.node)
                    .collect::<Vec<_>>();
                let ids = sorted_ids(graph, &nodes);
                if best.is_beaten_by(fee, &ids) {
                    best = Incumbent { fee, ids, nodes };
                }
                false
            } else {
                expanded += 1;
                if expanded > self.config.work_limit || self.past_deadline(started, expanded) {
                    return Search::Exhausted(best);
                }
                let outlook = self.outlook(&order[depth..], &decisions, &mut scratch);
                let bound = fee + outlook.remainder;
                bound > best.fee
                    || (bound == best.fee
                        && may_sort_first(
                            stack
                                .iter()
                                .filter(|frame| frame.accepted)
                                .map(|frame| graph.id(frame.node)),
                            outlook.first_open,
                            &best.ids,
                        ))
            };

            if descend {
                let node = order[depth];
                let accepted = decisions.fits(graph, node);
                if accepted {
                    decisions.accept(graph, node);
                    fee += graph.fee(node) as TotalFee;
                } else {
                    decisions.reject(graph, node);
                }
                stack.push(Frame { node, accepted });
                continue;
            }

            // Back up to the deepest acceptance and try rejecting it instead.
            loop {
                match stack.pop() {
                    None => return Search::Complete(best),
                    Some(frame) if frame.accepted => {
                        decisions.reject(graph, frame.node);
                        fee -= graph.fee(frame.node) as TotalFee;
                        stack.push(Frame {
                            node: frame.node,
                            accepted: false,
                        });
                        break;
                    }
                    Some(frame) => decisions.of[frame.node] = Decision::Undecided,
                }
            }
        }
    }

    // Bounds the fees `undecided` can still add given the decisions so far. Nodes sharing
    // a claim contribute only their largest fee, since at most one of them is accepted.
    fn outlook(
        &self,
        undecided: &[usize],
        decisions: &Decisions,
        scratch: &mut BoundScratch,
    ) -> Outlook<'a> {
        let graph = self.graph;
        let mut outlook = Outlook {
            remainder: 0,
            first_open: None,
        };
        for &node in undecided {
            let blocked_by_parent = graph.parents(node).iter().any(|&parent| {
                match decisions.of[parent] {
                    Decision::Rejected => true,
                    Decision::Undecided => scratch.dead[parent],
                    Decision::Accepted => false,
                }
            });
            let blocked_by_claim = graph
                .claims(node)
                .iter()
                .any(|&claim| decisions.held[claim]);
            scratch.dead[node] = blocked_by_parent || blocked_by_claim;
            if scratch.dead[node] {
                continue;
            }

            let id = graph.id(node);
            if outlook.first_open.map_or(true, |open| id < open) {
                outlook.first_open = Some(id);
            }
            let fee = graph.fee(node) as TotalFee;
            // Each node is charged to its first claim only, so no fee is counted twice.
            match graph.claims(node).first() {
                None => outlook.remainder += fee,
                Some(&claim) => {
                    let current = scratch.best_claimant[claim];
                    if current.is_none() {
                        scratch.touched.push(claim);
                    }
                    scratch.best_claimant[claim] = Some(current.map_or(fee, |c| c.max(fee)));
                }
            }
        }
        for claim in scratch.touched.drain(..) {
            outlook.remainder += scratch.best_claimant[claim].take().unwrap_or(0);
        }
        outlook
    }

    fn past_deadline(&self, started: Instant, expanded: u64) -> bool {
        match self.config.deadline {
            Some(deadline) if expanded % DEADLINE_CHECK_INTERVAL == 1 => {
                started.elapsed() >= deadline
            }
            _ => false,
        }
    }
}

fn sorted_ids(graph: &BatchGraph, nodes: &[usize]) -> Vec<TransactionId> {
    let mut ids = nodes
        .iter()
        .map(|&node| *graph.id(node))
        .collect::<Vec<_>>();
    ids.sort();
    ids
}

// Whether some completion of `accepted` could still sort before `best`. Nodes accepted from
// here on have ids of at least `first_open`, so the accepted ids below it are already a prefix
// of the final sorted list.
fn may_sort_first<'g>(
    accepted: impl Iterator<Item = &'g TransactionId>,
    first_open: Option<&TransactionId>,
    best: &[TransactionId],
) -> bool {
    let mut prefix = accepted
        .filter(|&id| first_open.map_or(true, |open| id < open))
        .collect::<Vec<_>>();
    prefix.sort();
    match prefix.iter().zip(best).find(|(id, other)| **id != *other) {
        Some((id, other)) => *id < other,
        None => prefix.len() <= best.len(),
    }
}
