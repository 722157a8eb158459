use crate::{
    Amount, InvalidReason, OutputIndex, SignatureVerifier, Transaction, TransactionOutput, UtxoId,
    UtxoPool,
};
use std::collections::HashSet;

/// Looks up the output claimed by an input.
/// The error reports why the claim can't be resolved in this context.
pub trait OutputResolver {
    fn resolve(
        &self,
        input_index: usize,
        utxo: &UtxoId,
    ) -> Result<&TransactionOutput, InvalidReason>;
}

impl OutputResolver for UtxoPool {
    fn resolve(
        &self,
        input_index: usize,
        utxo: &UtxoId,
    ) -> Result<&TransactionOutput, InvalidReason> {
        self.get(utxo).ok_or(InvalidReason::MissingUtxo {
            input_index,
            utxo: *utxo,
        })
    }
}

/// Result of a fee query.
/// Only `Paid` carries a fee, the other variants are never to be read as amounts.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Fee {
    Paid(Amount),
    /// Outputs exceed inputs by this much.
    Deficit(Amount),
    /// The claimed output can't be found.
    Unresolved(UtxoId),
    /// The transaction can't carry a fee at all, e.g. it has a negative output.
    Invalid(InvalidReason),
}

impl Fee {
    pub fn amount(&self) -> Option<Amount> {
        match self {
            Fee::Paid(amount) => Some(*amount),
            _ => None,
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, Fee::Paid(_))
    }
}

// Responsible for performing validation checks on a transaction.
// The checks that need outputs go through an `OutputResolver`, so the same rules apply to
// the pool alone and to a pool extended with outputs of other candidates.
pub struct TransactionValidator {}

impl TransactionValidator {
    /// Runs every check and returns the fee of a valid transaction.
    pub fn validate<R, V>(
        transaction: &Transaction,
        resolver: &R,
        verifier: &V,
    ) -> Result<Amount, InvalidReason>
    where
        R: OutputResolver + ?Sized,
        V: SignatureVerifier + ?Sized,
    {
        Self::validate_context_free(transaction)?;
        let outputs_sum = Self::sum_outputs(transaction)?;
        let mut inputs_sum: Amount = 0;
        for (index, input) in transaction.inputs().iter().enumerate() {
            let output = resolver.resolve(index, input.utxo())?;
            Self::validate_signature(transaction, index, output, verifier)?;
            inputs_sum = inputs_sum
                .checked_add(output.amount())
                .ok_or(InvalidReason::ValueOverflow)?;
        }
        Self::validate_funds(inputs_sum, outputs_sum)
    }

    /// Checks that need nothing but the transaction itself.
    pub fn validate_context_free(transaction: &Transaction) -> Result<(), InvalidReason> {
        Self::validate_no_self_reference(transaction)?;
        Self::validate_no_double_claim(transaction)?;
        Self::sum_outputs(transaction).map(|_| ())
    }

    /// Input value minus output value, with the same resolution rules as `validate`.
    pub fn calculate_fee<R>(transaction: &Transaction, resolver: &R) -> Fee
    where
        R: OutputResolver + ?Sized,
    {
        let outputs_sum = match Self::sum_outputs(transaction) {
            Ok(sum) => sum,
            Err(reason) => return Fee::Invalid(reason),
        };
        let mut inputs_sum: Amount = 0;
        for (index, input) in transaction.inputs().iter().enumerate() {
            let amount = match resolver.resolve(index, input.utxo()) {
                Ok(output) => output.amount(),
                Err(_) => return Fee::Unresolved(*input.utxo()),
            };
            inputs_sum = match inputs_sum.checked_add(amount) {
                Some(sum) => sum,
                None => return Fee::Invalid(InvalidReason::ValueOverflow),
            };
        }
        match inputs_sum.checked_sub(outputs_sum) {
            Some(fee) if fee >= 0 => Fee::Paid(fee),
            Some(fee) => Fee::Deficit(-fee),
            None => Fee::Invalid(InvalidReason::ValueOverflow),
        }
    }

    fn validate_no_self_reference(transaction: &Transaction) -> Result<(), InvalidReason> {
        match transaction
            .inputs()
            .iter()
            .position(|input| input.utxo().transaction_id() == transaction.id())
        {
            Some(index) => Err(InvalidReason::SelfReferential(index)),
            None => Ok(()),
        }
    }

    fn validate_no_double_claim(transaction: &Transaction) -> Result<(), InvalidReason> {
        let mut claimed = HashSet::new();
        for input in transaction.inputs() {
            if !claimed.insert(input.utxo()) {
                return Err(InvalidReason::SelfDoubleClaim(*input.utxo()));
            }
        }
        Ok(())
    }

    fn sum_outputs(transaction: &Transaction) -> Result<Amount, InvalidReason> {
        let mut sum: Amount = 0;
        for (index, output) in transaction.outputs().iter().enumerate() {
            if output.amount() < 0 {
                return Err(InvalidReason::NegativeOutputValue(OutputIndex::new(
                    index as u32,
                )));
            }
            sum = sum
                .checked_add(output.amount())
                .ok_or(InvalidReason::ValueOverflow)?;
        }
        Ok(sum)
    }

    fn validate_signature<V>(
        transaction: &Transaction,
        input_index: usize,
        claimed: &TransactionOutput,
        verifier: &V,
    ) -> Result<(), InvalidReason>
    where
        V: SignatureVerifier + ?Sized,
    {
        let payload = transaction
            .signable_payload(input_index)
            .map_err(|_| InvalidReason::BadSignature(input_index))?;
        let signature = transaction.inputs()[input_index].signature();
        if verifier.verify(claimed.recipient(), &payload, signature) {
            Ok(())
        } else {
            Err(InvalidReason::BadSignature(input_index))
        }
    }

    fn validate_funds(inputs_sum: Amount, outputs_sum: Amount) -> Result<Amount, InvalidReason> {
        if inputs_sum >= outputs_sum {
            Ok(inputs_sum - outputs_sum)
        } else {
            Err(InvalidReason::InsufficientFunds {
                inputs: inputs_sum,
                outputs: outputs_sum,
            })
        }
    }
}
