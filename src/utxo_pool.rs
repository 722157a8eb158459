use crate::{EngineError, TransactionOutput, UtxoId};
use std::collections::HashMap;

/// A pool of confirmed and unspent transaction outputs.
/// Cloning produces an independent snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UtxoPool {
    // Unspent transaction outputs, indexed by their transaction ID and their index in the
    // transaction.
    utxos: HashMap<UtxoId, TransactionOutput>,
}

impl UtxoPool {
    pub fn new() -> Self {
        Self {
            utxos: HashMap::new(),
        }
    }

    /// Builds a pool from outputs, failing on the first repeated identifier.
    pub fn from_outputs<I>(outputs: I) -> Result<Self, EngineError>
    where
        I: IntoIterator<Item = (UtxoId, TransactionOutput)>,
    {
        let mut pool = Self::new();
        for (utxo, output) in outputs {
            pool.insert(utxo, output)?;
        }
        Ok(pool)
    }

    pub fn contains(&self, utxo: &UtxoId) -> bool {
        self.utxos.contains_key(utxo)
    }

    pub fn get(&self, utxo: &UtxoId) -> Option<&TransactionOutput> {
        self.utxos.get(utxo)
    }

    pub fn insert(&mut self, utxo: UtxoId, output: TransactionOutput) -> Result<(), EngineError> {
        if self.utxos.contains_key(&utxo) {
            return Err(EngineError::DuplicateUtxo(utxo));
        }
        self.utxos.insert(utxo, output);
        Ok(())
    }

    pub fn remove(&mut self, utxo: &UtxoId) -> Option<TransactionOutput> {
        self.utxos.remove(utxo)
    }

    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&UtxoId, &TransactionOutput)> {
        self.utxos.iter()
    }

    /// All identifiers in the pool, sorted.
    pub fn all_utxos(&self) -> Vec<UtxoId> {
        let mut utxos = self.utxos.keys().copied().collect::<Vec<_>>();
        utxos.sort();
        utxos
    }
}
