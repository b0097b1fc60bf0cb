//! Even replica spread across the node pool.

use nicfaas_state::NodeId;

/// Distribute `desired` replicas over `nodes` as evenly as possible.
///
/// Every node gets `desired / n`; the first `desired % n` nodes (in the
/// given order) get one more. Every node appears in the result, zero
/// counts included.
pub fn even_spread(desired: u32, nodes: &[NodeId]) -> Vec<(NodeId, u32)> {
    if nodes.is_empty() {
        return Vec::new();
    }
    let n = nodes.len() as u32;
    let base = desired / n;
    let remainder = (desired % n) as usize;
    nodes
        .iter()
        .enumerate()
        .map(|(i, node)| {
            let extra = u32::from(i < remainder);
            (node.clone(), base + extra)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(n: usize) -> Vec<NodeId> {
        (0..n).map(|i| format!("10.0.0.{}", i + 1)).collect()
    }

    #[test]
    fn remainder_goes_to_first_nodes() {
        let plan = even_spread(7, &pool(3));
        let counts: Vec<u32> = plan.iter().map(|(_, c)| *c).collect();
        assert_eq!(counts, vec![3, 2, 2]);
        assert_eq!(plan[0].0, "10.0.0.1");
    }

    #[test]
    fn fewer_replicas_than_nodes_leaves_zeros() {
        let counts: Vec<u32> = even_spread(2, &pool(4)).into_iter().map(|(_, c)| c).collect();
        assert_eq!(counts, vec![1, 1, 0, 0]);
    }

    #[test]
    fn zero_replicas_writes_zero_everywhere() {
        let plan = even_spread(0, &pool(3));
        assert_eq!(plan.len(), 3);
        assert!(plan.iter().all(|(_, c)| *c == 0));
    }

    #[test]
    fn sums_match_and_differ_by_at_most_one() {
        for nodes in 1..=6 {
            for desired in 0..=40 {
                let plan = even_spread(desired, &pool(nodes));
                let counts: Vec<u32> = plan.iter().map(|(_, c)| *c).collect();
                assert_eq!(counts.iter().sum::<u32>(), desired);
                let max = counts.iter().max().unwrap();
                let min = counts.iter().min().unwrap();
                assert!(max - min <= 1, "{desired} over {nodes}: {counts:?}");
            }
        }
    }

    #[test]
    fn empty_pool_yields_empty_plan() {
        assert!(even_spread(5, &[]).is_empty());
    }
}
