use humansize::{format_size, BINARY};

use crate::{NodeIdx, PackList};

impl PackList {
    /// Walk the whole structure and assert every invariant the container
    /// maintains between public calls. Test code calls this after each
    /// operation; it's far too slow for anything else.
    pub fn dbg_check(&self) {
        // Forward walk: link symmetry, cached counts, no empty nodes.
        let mut entries = 0;
        let mut nodes = 0;
        let mut prev = NodeIdx::NONE;
        let mut n = self.head;
        while n.exists() {
            let node = &self[n];
            assert!(node.count > 0, "reachable node with zero count");
            assert_eq!(
                node.count,
                node.block.len(),
                "cached count out of sync with the block"
            );
            assert_eq!(node.prev, prev, "broken prev link");
            entries += node.count;
            nodes += 1;
            prev = n;
            n = node.next;
        }
        assert_eq!(prev, self.tail, "tail does not terminate the chain");
        assert_eq!(entries, self.count, "cached entry total is wrong");
        assert_eq!(nodes, self.num_nodes, "cached node total is wrong");

        // Reverse walk must see the same number of nodes.
        let mut nodes_rev = 0;
        let mut n = self.tail;
        while n.exists() {
            nodes_rev += 1;
            n = self[n].prev;
        }
        assert_eq!(nodes_rev, self.num_nodes, "reverse walk disagrees");

        // Emptiness is a single condition seen four ways.
        assert_eq!(self.head.exists(), self.tail.exists());
        assert_eq!(self.num_nodes == 0, !self.head.exists());
        assert_eq!(self.count == 0, self.num_nodes == 0);
    }

    /// Per-node entry counts, head to tail.
    pub fn node_counts(&self) -> Vec<usize> {
        let mut counts = Vec::with_capacity(self.num_nodes);
        let mut n = self.head;
        while n.exists() {
            counts.push(self[n].count);
            n = self[n].next;
        }
        counts
    }

    #[allow(unused)]
    pub fn print_stats(&self) {
        let mut blob = 0;
        let mut n = self.head;
        while n.exists() {
            blob += self[n].block.blob_bytes();
            n = self[n].next;
        }

        println!(
            "Packed list: {} entries across {} nodes",
            self.count, self.num_nodes
        );
        println!("Block storage: {}", format_size(blob, BINARY));
        if self.num_nodes > 0 {
            println!(
                "Average: {} entries / node, {} / node",
                self.count / self.num_nodes,
                format_size(blob / self.num_nodes, BINARY)
            );
        }
        println!(
            "Arena: {} slots ({} pooled)",
            self.nodes.len(),
            self.nodes.len() - self.num_nodes
        );
    }
}
