//! Precedence and conflict relations among the candidates of one epoch.
//!
//! A candidate may spend outputs of the pool or outputs created by another candidate.
//! The latter makes the creator a parent. Candidates claiming the same output form a
//! conflict set, of which at most one member may be accepted.

use crate::{
    Amount, InvalidReason, OutputResolver, SignatureVerifier, Transaction, TransactionId,
    TransactionOutput, TransactionValidator, UtxoId, UtxoPool,
};
use log::debug;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A candidate excluded from the epoch, and why.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Rejection {
    pub transaction_id: TransactionId,
    pub reason: InvalidReason,
}

/// Valid candidates, indexed by ascending transaction id, with their relations.
///
/// Every output claimed by some candidate is a claim, numbered in output order. A claim with
/// more than one claimant is a conflict set.
#[derive(Debug, Clone, Default)]
pub struct BatchGraph {
    transactions: Vec<Transaction>,
    fees: Vec<Amount>,
    parents: Vec<Vec<usize>>,
    children: Vec<Vec<usize>>,
    claims: Vec<Vec<usize>>,
    claimants: Vec<Vec<usize>>,
}

impl BatchGraph {
    /// Builds the graph from nodes, precedence edges `(parent, child)`, and the nodes claiming
    /// each output. Edges and claimants must refer to nodes in range.
    pub(crate) fn from_relations(
        transactions: Vec<Transaction>,
        fees: Vec<Amount>,
        edges: &[(usize, usize)],
        claimed_outputs: BTreeMap<UtxoId, Vec<usize>>,
    ) -> Self {
        let len = transactions.len();
        let mut parents = vec![BTreeSet::new(); len];
        let mut children = vec![BTreeSet::new(); len];
        for &(parent, child) in edges {
            parents[child].insert(parent);
            children[parent].insert(child);
        }
        let mut claims = vec![vec![]; len];
        let mut claimants = Vec::with_capacity(claimed_outputs.len());
        for (claim, nodes) in claimed_outputs.into_values().enumerate() {
            for &node in &nodes {
                claims[node].push(claim);
            }
            claimants.push(nodes);
        }
        let into_vecs = |sets: Vec<BTreeSet<usize>>| {
            sets.into_iter()
                .map(|set| set.into_iter().collect::<Vec<_>>())
                .collect::<Vec<_>>()
        };
        Self {
            transactions,
            fees,
            parents: into_vecs(parents),
            children: into_vecs(children),
            claims,
            claimants,
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn transaction(&self, node: usize) -> &Transaction {
        &self.transactions[node]
    }

    pub fn id(&self, node: usize) -> &TransactionId {
        self.transactions[node].id()
    }

    pub fn fee(&self, node: usize) -> Amount {
        self.fees[node]
    }

    /// Nodes that must be accepted before `node`.
    pub fn parents(&self, node: usize) -> &[usize] {
        &self.parents[node]
    }

    pub fn children(&self, node: usize) -> &[usize] {
        &self.children[node]
    }

    /// Claims `node` makes, one per input.
    pub fn claims(&self, node: usize) -> &[usize] {
        &self.claims[node]
    }

    pub fn claim_count(&self) -> usize {
        self.claimants.len()
    }

    /// Nodes making `claim`. At most one of them can be accepted.
    pub fn claimants(&self, claim: usize) -> &[usize] {
        &self.claimants[claim]
    }

    /// Whether any output is contended by more than one node.
    pub fn has_conflicts(&self) -> bool {
        self.claimants.iter().any(|nodes| nodes.len() > 1)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchAnalysis {
    pub graph: BatchGraph,
    pub rejected: Vec<Rejection>,
}

// Resolves claims against the pool first, then against outputs of other candidates.
struct BatchView<'a> {
    pool: &'a UtxoPool,
    producers: &'a BTreeMap<TransactionId, &'a Transaction>,
}

impl<'a> OutputResolver for BatchView<'a> {
    fn resolve(
        &self,
        input_index: usize,
        utxo: &UtxoId,
    ) -> Result<&TransactionOutput, InvalidReason> {
        if let Some(output) = self.pool.get(utxo) {
            return Ok(output);
        }
        self.producers
            .get(utxo.transaction_id())
            .and_then(|producer| {
                producer
                    .outputs()
                    .get(utxo.output_index().value() as usize)
            })
            .ok_or(InvalidReason::DanglingInput {
                input_index,
                utxo: *utxo,
            })
    }
}

pub struct DependencyAnalyzer {}

impl DependencyAnalyzer {
    /// Validates every candidate against the pool extended with the outputs of the other
    /// candidates, removes the invalid ones together with everything that depends on them,
    /// and relates the survivors.
    pub fn analyze<V>(candidates: &[Transaction], pool: &UtxoPool, verifier: &V) -> BatchAnalysis
    where
        V: SignatureVerifier + ?Sized,
    {
        let mut rejected = vec![];
        let mut alive: BTreeMap<TransactionId, &Transaction> = BTreeMap::new();
        for candidate in candidates {
            if alive.contains_key(candidate.id()) {
                debug!("Ignoring duplicate candidate: {}", candidate.id());
                continue;
            }
            match TransactionValidator::validate_context_free(candidate) {
                Ok(()) => {
                    alive.insert(*candidate.id(), candidate);
                }
                Err(reason) => Self::reject(&mut rejected, candidate.id(), reason),
            }
        }

        let mut fees = HashMap::new();
        let mut invalid = vec![];
        {
            let view = BatchView {
                pool,
                producers: &alive,
            };
            for (id, candidate) in &alive {
                match TransactionValidator::validate(candidate, &view, verifier) {
                    Ok(fee) => {
                        fees.insert(*id, fee);
                    }
                    Err(reason) => invalid.push((*id, reason)),
                }
            }
        }
        let mut removed = vec![];
        for (id, reason) in invalid {
            alive.remove(&id);
            Self::reject(&mut rejected, &id, reason);
            removed.push(id);
        }
        Self::remove_orphans(&mut alive, pool, removed, &mut rejected);

        let graph = Self::relate(&alive, &fees, pool);
        BatchAnalysis { graph, rejected }
    }

    // Candidates spending outputs of removed candidates are dangling, transitively.
    fn remove_orphans(
        alive: &mut BTreeMap<TransactionId, &Transaction>,
        pool: &UtxoPool,
        mut removed: Vec<TransactionId>,
        rejected: &mut Vec<Rejection>,
    ) {
        while let Some(gone) = removed.pop() {
            let orphans = alive
                .values()
                .filter_map(|candidate| {
                    candidate
                        .inputs()
                        .iter()
                        .enumerate()
                        .find(|(_, input)| {
                            input.utxo().transaction_id() == &gone && !pool.contains(input.utxo())
                        })
                        .map(|(input_index, input)| {
                            (
                                *candidate.id(),
                                InvalidReason::DanglingInput {
                                    input_index,
                                    utxo: *input.utxo(),
                                },
                            )
                        })
                })
                .collect::<Vec<_>>();
            for (id, reason) in orphans {
                alive.remove(&id);
                Self::reject(rejected, &id, reason);
                removed.push(id);
            }
        }
    }

    fn relate(
        alive: &BTreeMap<TransactionId, &Transaction>,
        fees: &HashMap<TransactionId, Amount>,
        pool: &UtxoPool,
    ) -> BatchGraph {
        let index_of = alive
            .keys()
            .enumerate()
            .map(|(index, id)| (*id, index))
            .collect::<HashMap<_, _>>();
        let mut edges = vec![];
        let mut claimed_outputs: BTreeMap<UtxoId, Vec<usize>> = BTreeMap::new();
        for (node, candidate) in alive.values().enumerate() {
            for input in candidate.inputs() {
                let utxo = input.utxo();
                claimed_outputs.entry(*utxo).or_default().push(node);
                if !pool.contains(utxo) {
                    if let Some(&parent) = index_of.get(utxo.transaction_id()) {
                        edges.push((parent, node));
                    }
                }
            }
        }
        let transactions = alive.values().map(|tx| (*tx).clone()).collect::<Vec<_>>();
        let node_fees = alive.keys().map(|id| fees[id]).collect::<Vec<_>>();
        BatchGraph::from_relations(transactions, node_fees, &edges, claimed_outputs)
    }

    fn reject(rejected: &mut Vec<Rejection>, id: &TransactionId, reason: InvalidReason) {
        debug!("Excluding candidate {}: {}", id, reason);
        rejected.push(Rejection {
            transaction_id: *id,
            reason,
        });
    }
}
