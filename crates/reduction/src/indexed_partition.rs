use std::fmt;

use bisim_lts::StateIndex;

use crate::Partition;

/// Defines a partition based on an explicit indexing of elements to their block
/// number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexedPartition {
    partition: Vec<usize>,

    num_of_blocks: usize,
}

impl IndexedPartition {
    /// Create a new partition where all elements are in a single block.
    pub fn new(num_of_elements: usize) -> IndexedPartition {
        IndexedPartition {
            partition: vec![0; num_of_elements],
            num_of_blocks: 1,
        }
    }

    /// Creates a partition from the block number of every element. The block
    /// numbers must be dense.
    pub fn from_blocks(partition: Vec<usize>) -> IndexedPartition {
        let num_of_blocks = partition.iter().max().map_or(0, |max| max + 1);
        IndexedPartition { partition, num_of_blocks }
    }

    /// Sets the block number of the given element
    pub fn set_block(&mut self, element_index: StateIndex, block_number: usize) {
        // Assumes that the blocks are dense, otherwise it overestimates the number of blocks.
        self.num_of_blocks = self.num_of_blocks.max(block_number + 1);

        self.partition[element_index] = block_number;
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.partition.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partition.is_empty()
    }

    /// Returns true iff both partitions put the same elements together,
    /// regardless of the numbering of the blocks.
    pub fn same_relation(&self, other: &impl Partition) -> bool {
        let mut forward = vec![None; self.num_of_blocks];
        let mut backward = vec![None; other.num_of_blocks()];

        for (element_index, block) in self.partition.iter().enumerate() {
            let other_block = other.block_number(element_index);

            match (forward[*block], backward[other_block]) {
                (None, None) => {
                    forward[*block] = Some(other_block);
                    backward[other_block] = Some(*block);
                }
                (Some(mapped), Some(mapped_back)) if mapped == other_block && mapped_back == *block => {}
                _ => return false,
            }
        }

        true
    }
}

impl fmt::Display for IndexedPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ ")?;

        let mut first = true;

        for block_index in 0..self.num_of_blocks {
            // Print all elements with the same block number.
            let mut first_block = true;
            for (element_index, _) in self.partition.iter().enumerate().filter(|(_, value)| **value == block_index) {
                if !first_block {
                    write!(f, ", ")?;
                } else {
                    if !first {
                        write!(f, ", ")?;
                    }

                    write!(f, "{{")?;
                }

                write!(f, "{}", element_index)?;
                first_block = false;
            }

            if !first_block {
                write!(f, "}}")?;
                first = false;
            }
        }

        write!(f, " }}")
    }
}

impl Partition for IndexedPartition {
    fn block_number(&self, state_index: StateIndex) -> usize {
        self.partition[state_index]
    }

    fn num_of_blocks(&self) -> usize {
        self.num_of_blocks
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_same_relation() {
        let left = IndexedPartition::from_blocks(vec![0, 0, 1, 2]);
        let renumbered = IndexedPartition::from_blocks(vec![2, 2, 0, 1]);
        let coarser = IndexedPartition::from_blocks(vec![0, 0, 1, 1]);

        assert!(left.same_relation(&renumbered));
        assert!(!left.same_relation(&coarser));
        assert!(!coarser.same_relation(&left));
        assert_eq!(format!("{left}"), "{ {0, 1}, {2}, {3} }");
    }
}
