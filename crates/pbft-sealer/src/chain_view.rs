/// Minimal committed-chain header, enough to extend the next block from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: u64,
    pub parent_hash: [u8; 32],
    pub hash: [u8; 32],
}

/// Read-only adapter onto the committed chain. Implementations are assumed
/// internally synchronized; a read is treated as an atomic snapshot.
pub trait ChainView: Send + Sync {
    /// The number of the most recently committed block.
    fn number(&self) -> u64;

    /// The header of the committed block at `number`.
    fn block_by_number(&self, number: u64) -> Option<BlockHeader>;

    /// The header of the current chain head (`block_by_number(self.number())`).
    fn head(&self) -> BlockHeader {
        self.block_by_number(self.number())
            .unwrap_or(BlockHeader { number: 0, parent_hash: [0; 32], hash: [0; 32] })
    }
}
