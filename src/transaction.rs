use crate::{PublicKey, Sha256, TransactionError};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Amount of coins carried by a transaction output.
/// Signed so that malformed outputs with negative values can be represented and rejected.
pub type Amount = i64;

/// A double SHA-256 hash of the transaction data.
#[derive(Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Serialize, Deserialize)]
pub struct TransactionId(Sha256);

impl Display for TransactionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TransactionId {
    pub fn new(data: Sha256) -> Self {
        Self(data)
    }

    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }
}

/// The index of the transaction output.
#[derive(Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Serialize, Deserialize)]
pub struct OutputIndex(u32);

impl Display for OutputIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl OutputIndex {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

/// Identifies a transaction output: the transaction that created it and its position there.
#[derive(Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Copy, Clone, Serialize, Deserialize)]
pub struct UtxoId {
    transaction_id: TransactionId,
    output_index: OutputIndex,
}

impl Display for UtxoId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.transaction_id, self.output_index)
    }
}

impl UtxoId {
    pub fn new(transaction_id: TransactionId, output_index: OutputIndex) -> Self {
        Self {
            transaction_id,
            output_index,
        }
    }

    pub fn transaction_id(&self) -> &TransactionId {
        &self.transaction_id
    }

    pub fn output_index(&self) -> OutputIndex {
        self.output_index
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct TransactionInput {
    // The output being spent.
    utxo: UtxoId,
    // Compact signature over the signable payload at this input's position.
    signature: Vec<u8>,
}

impl Display for TransactionInput {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.utxo)
    }
}

impl TransactionInput {
    /// Creates an input without a signature. Use `Transaction::with_signature` to sign it.
    pub fn new(utxo: UtxoId) -> Self {
        Self {
            utxo,
            signature: vec![],
        }
    }

    pub fn with_signature(utxo: UtxoId, signature: Vec<u8>) -> Self {
        Self { utxo, signature }
    }

    pub fn utxo(&self) -> &UtxoId {
        &self.utxo
    }

    pub fn signature(&self) -> &[u8] {
        &self.signature
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct TransactionOutput {
    recipient: PublicKey,
    amount: Amount,
}

impl Display for TransactionOutput {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.amount, self.recipient)
    }
}

impl TransactionOutput {
    pub fn new(recipient: PublicKey, amount: Amount) -> Self {
        Self { recipient, amount }
    }

    pub fn recipient(&self) -> &PublicKey {
        &self.recipient
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }
}

/// An immutable transfer of coins. Its identity is the hash of its inputs and outputs.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    id: TransactionId,
    inputs: Vec<TransactionInput>,
    outputs: Vec<TransactionOutput>,
}

impl Transaction {
    pub fn new(
        inputs: Vec<TransactionInput>,
        outputs: Vec<TransactionOutput>,
    ) -> Result<Self, TransactionError> {
        let id = Self::hash_transaction_data(&inputs, &outputs)?;
        Ok(Self {
            id,
            inputs,
            outputs,
        })
    }

    /// Creates a transaction whose identity has been computed elsewhere.
    /// The identity is trusted as given, it is not checked against the content.
    pub fn with_id(
        id: TransactionId,
        inputs: Vec<TransactionInput>,
        outputs: Vec<TransactionOutput>,
    ) -> Self {
        Self {
            id,
            inputs,
            outputs,
        }
    }

    pub fn id(&self) -> &TransactionId {
        &self.id
    }

    pub fn inputs(&self) -> &Vec<TransactionInput> {
        &self.inputs
    }

    pub fn outputs(&self) -> &Vec<TransactionOutput> {
        &self.outputs
    }

    /// Identifiers of the outputs this transaction creates once applied.
    pub fn created_utxos(&self) -> impl Iterator<Item = (UtxoId, &TransactionOutput)> + '_ {
        self.outputs.iter().enumerate().map(move |(index, output)| {
            (
                UtxoId::new(self.id, OutputIndex::new(index as u32)),
                output,
            )
        })
    }

    /// Bytes signed by the owner of the output claimed at `input_index`.
    /// Signatures are excluded, so the payload is the same before and after signing.
    pub fn signable_payload(&self, input_index: usize) -> Result<Vec<u8>, TransactionError> {
        let input = self
            .inputs
            .get(input_index)
            .ok_or(TransactionError::InputIndexOutOfRange(input_index))?;
        Ok(bincode::serialize(&(
            input_index as u32,
            &input.utxo,
            &self.outputs,
        ))?)
    }

    /// Attaches a signature to the input at `input_index` and recomputes the identity.
    pub fn with_signature(
        mut self,
        input_index: usize,
        signature: Vec<u8>,
    ) -> Result<Self, TransactionError> {
        match self.inputs.get_mut(input_index) {
            None => Err(TransactionError::InputIndexOutOfRange(input_index)),
            Some(input) => {
                input.signature = signature;
                Self::new(self.inputs, self.outputs)
            }
        }
    }

    fn hash_transaction_data(
        inputs: &Vec<TransactionInput>,
        outputs: &Vec<TransactionOutput>,
    ) -> Result<TransactionId, TransactionError> {
        let data = bincode::serialize(&(inputs, outputs))?;
        let first_hash = Sha256::digest(&data);
        let second_hash = Sha256::digest(first_hash.as_slice());
        Ok(TransactionId(second_hash))
    }
}
