use crate::{
    Amount, BatchSelector, DependencyAnalyzer, EngineError, Fee, HandlerConfig, InvalidReason,
    PoolCommitter, Rejection, Secp256k1Verifier, SelectionMode, SignatureVerifier, TotalFee,
    Transaction, TransactionId, TransactionValidator, UtxoPool,
};
use log::{error, info};

/// Outcome of the last epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionReport {
    pub mode: SelectionMode,
    pub total_fee: TotalFee,
    /// Accepted transactions in commit order.
    pub accepted: Vec<TransactionId>,
    pub rejected: Vec<Rejection>,
}

/// Settles epochs of proposed transactions against a private copy of the pool.
/// Each epoch accepts the admissible subset with the largest total fee.
pub struct MaxFeeTxHandler<V = Secp256k1Verifier> {
    utxo_pool: UtxoPool,
    verifier: V,
    config: HandlerConfig,
    last_report: Option<SelectionReport>,
}

impl MaxFeeTxHandler<Secp256k1Verifier> {
    pub fn new(utxo_pool: &UtxoPool) -> Self {
        Self::with_config(utxo_pool, HandlerConfig::default())
    }

    pub fn with_config(utxo_pool: &UtxoPool, config: HandlerConfig) -> Self {
        Self::with_verifier(utxo_pool, Secp256k1Verifier, config)
    }
}

impl<V: SignatureVerifier> MaxFeeTxHandler<V> {
    pub fn with_verifier(utxo_pool: &UtxoPool, verifier: V, config: HandlerConfig) -> Self {
        Self {
            utxo_pool: utxo_pool.clone(),
            verifier,
            config,
            last_report: None,
        }
    }

    pub fn utxo_pool(&self) -> &UtxoPool {
        &self.utxo_pool
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    pub fn last_report(&self) -> Option<&SelectionReport> {
        self.last_report.as_ref()
    }

    /// Whether `transaction` could be applied to the current pool on its own.
    pub fn is_valid_tx(&self, transaction: &Transaction) -> bool {
        self.check_transaction(transaction).is_ok()
    }

    /// Like `is_valid_tx`, but says why and returns the fee.
    pub fn check_transaction(&self, transaction: &Transaction) -> Result<Amount, InvalidReason> {
        TransactionValidator::validate(transaction, &self.utxo_pool, &self.verifier)
    }

    /// Fee of `transaction` against the current pool.
    pub fn calculate_fee(&self, transaction: &Transaction) -> Fee {
        TransactionValidator::calculate_fee(transaction, &self.utxo_pool)
    }

    /// Settles one epoch. Returns the accepted transactions in the order they were applied.
    /// Invalid and outbid candidates are dropped. An error means an internal invariant broke, in
    /// which case the pool is unchanged.
    pub fn handle_txs(
        &mut self,
        candidates: &[Transaction],
    ) -> Result<Vec<Transaction>, EngineError> {
        let analysis = DependencyAnalyzer::analyze(candidates, &self.utxo_pool, &self.verifier);
        let graph = &analysis.graph;

        let selection = BatchSelector::new(graph, &self.config)
            .select()
            .map_err(|e| {
                error!("Rejecting epoch: {}", e);
                e
            })?;
        let accepted = selection
            .order()
            .iter()
            .map(|&node| graph.transaction(node))
            .collect::<Vec<_>>();

        PoolCommitter::commit(&mut self.utxo_pool, &accepted).map_err(|e| {
            error!("Commit aborted: {}", e);
            e
        })?;

        info!(
            "Epoch settled: {} candidates, {} accepted, {} rejected, total fee {} ({:?})",
            candidates.len(),
            accepted.len(),
            analysis.rejected.len(),
            selection.total_fee(),
            selection.mode()
        );
        self.last_report = Some(SelectionReport {
            mode: selection.mode(),
            total_fee: selection.total_fee(),
            accepted: accepted.iter().map(|tx| *tx.id()).collect(),
            rejected: analysis.rejected.clone(),
        });
        Ok(accepted.into_iter().cloned().collect())
    }
}
