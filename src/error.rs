use crate::{Amount, OutputIndex, TransactionId, UtxoId};
use thiserror::Error;

/// Why a candidate transaction was excluded from an epoch.
/// These never fail an epoch, they only remove the candidate from consideration.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum InvalidReason {
    #[error("input {input_index} claims {utxo} which is not in the pool")]
    MissingUtxo { input_index: usize, utxo: UtxoId },
    #[error("{0} is claimed more than once by the same transaction")]
    SelfDoubleClaim(UtxoId),
    #[error("output {0} has a negative value")]
    NegativeOutputValue(OutputIndex),
    #[error("signature of input {0} does not verify")]
    BadSignature(usize),
    #[error("inputs sum to {inputs} which is less than the outputs sum {outputs}")]
    InsufficientFunds { inputs: Amount, outputs: Amount },
    #[error("input {input_index} claims {utxo} which neither the pool nor any valid candidate provides")]
    DanglingInput { input_index: usize, utxo: UtxoId },
    #[error("input {0} spends an output of its own transaction")]
    SelfReferential(usize),
    #[error("values overflow the amount range")]
    ValueOverflow,
}

/// Broken internal invariants. Unlike `InvalidReason`, these abort the epoch.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum EngineError {
    #[error("dependency cycle among candidates {participants:?}")]
    InconsistentBatch { participants: Vec<TransactionId> },
    #[error("commit of {transaction} failed: {detail}")]
    CommitInvariantViolation {
        transaction: TransactionId,
        detail: String,
    },
    #[error("utxo {0} is already in the pool")]
    DuplicateUtxo(UtxoId),
}

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("transaction has no input at index {0}")]
    InputIndexOutOfRange(usize),
    #[error("no signing key for input {0}")]
    MissingSigningKey(usize),
    #[error("failed to encode transaction: {0}")]
    Encoding(#[from] bincode::Error),
}
