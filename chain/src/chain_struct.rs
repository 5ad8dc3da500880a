/// The canonical ordered run of blocks held in memory.
///
/// Backed by a growable array rather than a linked node graph: head and tail
/// operations stay O(1) amortized and there are no cyclic ownership concerns.
/// The structure performs no linkage verification and no locking; callers
/// append pre-validated blocks and serialize concurrent writers themselves.
use primitives::Block;

#[derive(Debug, Clone)]
pub struct ChainStruct {
    blocks: Vec<Block>,
}

impl ChainStruct {
    /// Seed a chain with its first block. The chain is never empty after
    /// construction, so `first`/`last` always have a block to return.
    pub fn new(genesis: Block) -> Self {
        ChainStruct {
            blocks: vec![genesis],
        }
    }

    /// Build a chain from a finalized history.
    ///
    /// Seeds with the first element and appends the rest in order. Callers
    /// must pre-sort ascending by height; no sorting or validation happens
    /// here.
    ///
    /// # Panics
    ///
    /// Panics when `blocks` is empty.
    pub fn make_finalized_chain(blocks: Vec<Block>) -> Self {
        let mut iter = blocks.into_iter();
        let first = iter.next().expect("finalized chain requires at least one block");
        let mut chain = ChainStruct::new(first);
        for block in iter {
            chain.append(block);
        }
        chain
    }

    /// Add a block at the tail.
    pub fn append(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Add a block at the head, for backfilled history.
    pub fn insert_prev(&mut self, block: Block) {
        self.blocks.insert(0, block);
    }

    pub fn first(&self) -> &Block {
        &self.blocks[0]
    }

    pub fn last(&self) -> &Block {
        &self.blocks[self.blocks.len() - 1]
    }

    /// Visit every block head to tail, stopping at the first visitor error
    /// and propagating it.
    pub fn range<E>(&self, mut visit: impl FnMut(&Block) -> Result<(), E>) -> Result<(), E> {
        for block in &self.blocks {
            visit(block)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitives::{BlockNum, Hash32, Header};

    fn block(height: u64) -> Block {
        Block {
            header: Header {
                height: BlockNum(height),
                prev_hash: Hash32::ZERO,
                txn_root: Hash32::ZERO,
                timestamp: height,
                target_bits: 8,
                nonce: 0,
            },
            txn_hashes: Vec::new(),
        }
    }

    #[test]
    fn append_then_last_returns_appended() {
        let mut chain = ChainStruct::new(block(0));
        chain.append(block(1));
        assert_eq!(chain.last().height(), BlockNum(1));
        assert_eq!(chain.first().height(), BlockNum(0));
    }

    #[test]
    fn insert_prev_then_first_returns_prepended() {
        let mut chain = ChainStruct::new(block(5));
        chain.insert_prev(block(4));
        assert_eq!(chain.first().height(), BlockNum(4));
        assert_eq!(chain.last().height(), BlockNum(5));
    }

    #[test]
    fn range_visits_in_append_order() {
        let mut chain = ChainStruct::new(block(0));
        chain.append(block(1));
        chain.append(block(2));

        let mut seen = Vec::new();
        chain
            .range(|b| {
                seen.push(b.height().0);
                Ok::<(), ()>(())
            })
            .unwrap();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn range_short_circuits_on_visitor_error() {
        let mut chain = ChainStruct::new(block(0));
        chain.append(block(1));
        chain.append(block(2));

        let mut visited = 0;
        let result = chain.range(|b| {
            visited += 1;
            if b.height() == BlockNum(1) {
                Err("stop")
            } else {
                Ok(())
            }
        });
        assert_eq!(result, Err("stop"));
        assert_eq!(visited, 2);
    }

    #[test]
    fn make_finalized_chain_keeps_order() {
        let chain = ChainStruct::make_finalized_chain(vec![block(3), block(4), block(5)]);
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.first().height(), BlockNum(3));
        assert_eq!(chain.last().height(), BlockNum(5));
    }

    #[test]
    #[should_panic(expected = "finalized chain requires at least one block")]
    fn make_finalized_chain_panics_on_empty_input() {
        ChainStruct::make_finalized_chain(Vec::new());
    }
}
