//! Fixtures shared by the unit tests.

use crate::signature::{public_key, sign_transaction};
use crate::{
    Amount, OutputIndex, PublicKey, Sha256, Transaction, TransactionId, TransactionInput,
    TransactionOutput, UtxoId, UtxoPool,
};
use secp256k1::SecretKey;

/// Deterministic key pair derived from `seed`.
pub(crate) fn key(seed: u8) -> (SecretKey, PublicKey) {
    let mut raw = [0; 32];
    raw[0] = 1;
    raw[31] = seed;
    let secret_key = SecretKey::from_slice(&raw).unwrap();
    let public_key = public_key(&secret_key);
    (secret_key, public_key)
}

/// Output `index` of a fictional transaction named `name`.
pub(crate) fn genesis_utxo(name: &str, index: u32) -> UtxoId {
    UtxoId::new(
        TransactionId::new(Sha256::digest(name.as_bytes())),
        OutputIndex::new(index),
    )
}

/// Pool holding one output per entry, owned by the key derived from the seed.
pub(crate) fn pool_with(entries: &[(UtxoId, u8, Amount)]) -> UtxoPool {
    UtxoPool::from_outputs(
        entries
            .iter()
            .map(|(utxo, seed, amount)| (*utxo, TransactionOutput::new(key(*seed).1, *amount))),
    )
    .unwrap()
}

/// A transaction spending `inputs`, each signed by the key derived from its seed,
/// and paying `outputs` to the keys derived from their seeds.
pub(crate) fn spend(inputs: &[(UtxoId, u8)], outputs: &[(u8, Amount)]) -> Transaction {
    let secret_keys = inputs
        .iter()
        .map(|(_, seed)| key(*seed).0)
        .collect::<Vec<_>>();
    let transaction = Transaction::new(
        inputs
            .iter()
            .map(|(utxo, _)| TransactionInput::new(*utxo))
            .collect(),
        outputs
            .iter()
            .map(|(seed, amount)| TransactionOutput::new(key(*seed).1, *amount))
            .collect(),
    )
    .unwrap();
    sign_transaction(transaction, &secret_keys.iter().collect::<Vec<_>>()).unwrap()
}

/// The output at `index` of `transaction`.
pub(crate) fn output_of(transaction: &Transaction, index: u32) -> UtxoId {
    UtxoId::new(*transaction.id(), OutputIndex::new(index))
}

pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}
