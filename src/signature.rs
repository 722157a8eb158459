//! Keys and signatures over transaction payloads.
//!
//! Payloads are hashed with SHA-256 and signed with ECDSA over secp256k1.
//! Signatures travel in their 64-byte compact form.

use crate::{Sha256, Transaction, TransactionError};
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, SecretKey, SECP256K1};

/// Key that owns a transaction output.
pub type PublicKey = secp256k1::PublicKey;

/// Checks that `signature` was produced over `message` by the owner of `key`.
pub trait SignatureVerifier {
    fn verify(&self, key: &PublicKey, message: &[u8], signature: &[u8]) -> bool;
}

/// ECDSA verification against the global secp256k1 context.
#[derive(Debug, Default, Clone, Copy)]
pub struct Secp256k1Verifier;

impl SignatureVerifier for Secp256k1Verifier {
    fn verify(&self, key: &PublicKey, message: &[u8], signature: &[u8]) -> bool {
        match Signature::from_compact(signature) {
            Ok(signature) => SECP256K1
                .verify_ecdsa(&message_digest(message), &signature, key)
                .is_ok(),
            Err(_) => false,
        }
    }
}

/// Public key matching `secret_key`.
pub fn public_key(secret_key: &SecretKey) -> PublicKey {
    PublicKey::from_secret_key(SECP256K1, secret_key)
}

/// Produces the compact signature for the input at `input_index`.
pub fn sign_input(
    transaction: &Transaction,
    input_index: usize,
    secret_key: &SecretKey,
) -> Result<Vec<u8>, TransactionError> {
    let payload = transaction.signable_payload(input_index)?;
    let signature = SECP256K1.sign_ecdsa(&message_digest(&payload), secret_key);
    Ok(signature.serialize_compact().to_vec())
}

/// Signs every input, the i-th with the i-th key.
pub fn sign_transaction(
    transaction: Transaction,
    secret_keys: &[&SecretKey],
) -> Result<Transaction, TransactionError> {
    let mut transaction = transaction;
    for index in 0..transaction.inputs().len() {
        let secret_key = secret_keys
            .get(index)
            .ok_or(TransactionError::MissingSigningKey(index))?;
        let signature = sign_input(&transaction, index, secret_key)?;
        transaction = transaction.with_signature(index, signature)?;
    }
    Ok(transaction)
}

fn message_digest(message: &[u8]) -> Message {
    let mut digest = [0; 32];
    digest.copy_from_slice(Sha256::digest(message).as_slice());
    Message::from_digest(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::key;
    use crate::{OutputIndex, TransactionId, TransactionInput, TransactionOutput, UtxoId};

    fn unsigned() -> Transaction {
        let utxo = UtxoId::new(
            TransactionId::new(Sha256::digest(b"parent")),
            OutputIndex::new(0),
        );
        Transaction::new(
            vec![TransactionInput::new(utxo)],
            vec![TransactionOutput::new(key(9).1, 3)],
        )
        .unwrap()
    }

    #[test]
    fn signature_verifies_for_owner_only() {
        let (owner_secret, owner) = key(1);
        let (_, stranger) = key(2);
        let tx = sign_transaction(unsigned(), &[&owner_secret]).unwrap();
        let payload = tx.signable_payload(0).unwrap();
        let signature = tx.inputs()[0].signature();

        assert!(Secp256k1Verifier.verify(&owner, &payload, signature));
        assert!(!Secp256k1Verifier.verify(&stranger, &payload, signature));
        assert!(!Secp256k1Verifier.verify(&owner, b"other message", signature));
    }

    #[test]
    fn malformed_signature_is_rejected() {
        let (_, owner) = key(1);
        assert!(!Secp256k1Verifier.verify(&owner, b"message", &[1, 2, 3]));
        assert!(!Secp256k1Verifier.verify(&owner, b"message", &[]));
    }

    #[test]
    fn signing_requires_a_key_per_input() {
        assert!(matches!(
            sign_transaction(unsigned(), &[]),
            Err(TransactionError::MissingSigningKey(0))
        ));
    }
}
