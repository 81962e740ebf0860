use crate::chain_view::BlockHeader;

/// A transaction as seen by the sealer: opaque payload, ordering is the
/// pool's concern, not ours.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub hash: [u8; 32],
    pub payload: Vec<u8>,
}

/// The scratch block being assembled by the [`crate::SealerLoop`].
///
/// Owned exclusively by the loop; never touched by event handlers. Reset
/// whenever a candidate is dropped, per §4.1 of the sealer's assembly
/// policy.
#[derive(Debug, Default)]
pub struct SealingBlock {
    header: Option<BlockHeader>,
    transactions: Vec<Transaction>,
    transaction_root: Option<[u8; 32]>,
}

impl SealingBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populates the header from the given committed parent: number =
    /// parent.number + 1, parent_hash = parent.hash.
    pub fn populate_from_parent(&mut self, parent: BlockHeader) {
        self.header = Some(BlockHeader {
            number: parent.number + 1,
            parent_hash: parent.hash,
            hash: [0; 32],
        });
    }

    pub fn fill(&mut self, transactions: Vec<Transaction>) {
        self.transactions = transactions;
    }

    pub fn transaction_count(&self) -> u64 {
        self.transactions.len() as u64
    }

    pub fn header(&self) -> Option<BlockHeader> {
        self.header
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    /// Computes and stores the transaction root. A stand-in for a real
    /// Merkle computation: the core's contract is only that this runs once
    /// per assembly, before submission.
    pub fn calculate_transaction_root(&mut self) {
        let mut root = [0u8; 32];
        for txn in &self.transactions {
            for (i, byte) in txn.hash.iter().enumerate() {
                root[i] ^= byte;
            }
        }
        self.transaction_root = Some(root);
    }

    pub fn transaction_root(&self) -> Option<[u8; 32]> {
        self.transaction_root
    }

    /// Drops the candidate: the block is never retransmitted, only
    /// regenerated from a clean slate.
    pub fn reset(&mut self) {
        self.header = None;
        self.transactions.clear();
        self.transaction_root = None;
    }

    pub fn is_empty(&self) -> bool {
        self.header.is_none()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod sealing_block_test {
    use super::*;

    fn header(number: u64) -> BlockHeader {
        BlockHeader { number, parent_hash: [1; 32], hash: [2; 32] }
    }

    #[test]
    fn populate_from_parent_increments_number() {
        let mut block = SealingBlock::new();
        block.populate_from_parent(header(41));
        assert_eq!(block.header().unwrap().number, 42);
        assert_eq!(block.header().unwrap().parent_hash, [2; 32]);
    }

    #[test]
    fn reset_clears_everything() {
        let mut block = SealingBlock::new();
        block.populate_from_parent(header(1));
        block.fill(vec![Transaction { hash: [3; 32], payload: vec![] }]);
        block.calculate_transaction_root();
        block.reset();
        assert!(block.is_empty());
        assert_eq!(block.transaction_count(), 0);
        assert!(block.transaction_root().is_none());
    }
}
