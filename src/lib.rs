pub mod batch_selector;
pub mod config;
pub mod dependency_graph;
pub mod error;
pub mod hash;
pub mod pool_committer;
pub mod signature;
pub mod transaction;
pub mod tx_handler;
pub mod utxo_pool;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_utils;

pub use self::{
    batch_selector::*, config::*, dependency_graph::*, error::*, hash::*, pool_committer::*,
    signature::*, transaction::*, tx_handler::*, utxo_pool::*, validation::*,
};
