use crate::{EngineError, Transaction, UtxoPool};

/// Applies accepted transactions to the pool, all of them or none.
pub struct PoolCommitter {}

impl PoolCommitter {
    /// Applies `transactions` in the given order.
    /// Each one is applied in full before the next, so later transactions may spend outputs
    /// created by earlier ones. On error the pool is left untouched.
    pub fn commit(pool: &mut UtxoPool, transactions: &[&Transaction]) -> Result<(), EngineError> {
        let mut working = pool.clone();
        for transaction in transactions {
            Self::apply(&mut working, transaction)?;
        }
        *pool = working;
        Ok(())
    }

    fn apply(pool: &mut UtxoPool, transaction: &Transaction) -> Result<(), EngineError> {
        for input in transaction.inputs() {
            if pool.remove(input.utxo()).is_none() {
                return Err(EngineError::CommitInvariantViolation {
                    transaction: *transaction.id(),
                    detail: format!("claimed output {} is not in the pool", input.utxo()),
                });
            }
        }
        for (utxo, output) in transaction.created_utxos() {
            pool.insert(utxo, output.clone())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{genesis_utxo, output_of, pool_with, spend};

    #[test]
    fn chained_transactions_apply_in_order() {
        let u = genesis_utxo("g", 0);
        let mut pool = pool_with(&[(u, 1, 10)]);
        let t1 = spend(&[(u, 1)], &[(2, 4), (5, 1)]);
        let t2 = spend(&[(output_of(&t1, 0), 2)], &[(3, 3)]);

        PoolCommitter::commit(&mut pool, &[&t1, &t2]).unwrap();
        assert!(!pool.contains(&u));
        assert!(!pool.contains(&output_of(&t1, 0)));
        assert_eq!(pool.get(&output_of(&t1, 1)).unwrap().amount(), 1);
        assert_eq!(pool.get(&output_of(&t2, 0)).unwrap().amount(), 3);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn failure_leaves_the_pool_unchanged() {
        let u = genesis_utxo("g", 0);
        let mut pool = pool_with(&[(u, 1, 10)]);
        let before = pool.clone();
        let t1 = spend(&[(u, 1)], &[(2, 4)]);
        let t2 = spend(&[(u, 1)], &[(3, 3)]);

        let error = PoolCommitter::commit(&mut pool, &[&t1, &t2]).unwrap_err();
        assert!(matches!(
            error,
            EngineError::CommitInvariantViolation { transaction, .. } if transaction == *t2.id()
        ));
        assert_eq!(pool, before);
    }

    #[test]
    fn wrong_order_is_a_violation() {
        let u = genesis_utxo("g", 0);
        let mut pool = pool_with(&[(u, 1, 10)]);
        let t1 = spend(&[(u, 1)], &[(2, 4)]);
        let t2 = spend(&[(output_of(&t1, 0), 2)], &[(3, 3)]);
        assert!(PoolCommitter::commit(&mut pool, &[&t2, &t1]).is_err());
        assert!(pool.contains(&u));
    }

    #[test]
    fn recreating_an_existing_output_is_a_duplicate() {
        let u = genesis_utxo("g", 0);
        let t1 = spend(&[(u, 1)], &[(2, 4)]);
        let mut pool = pool_with(&[(u, 1, 10), (output_of(&t1, 0), 2, 4)]);
        assert_eq!(
            PoolCommitter::commit(&mut pool, &[&t1]),
            Err(EngineError::DuplicateUtxo(output_of(&t1, 0)))
        );
        assert!(pool.contains(&u));
    }
}
