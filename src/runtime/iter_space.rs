use serde::{Serialize, Deserialize};

/// Partition of a loop nest's iteration space across tasks.
///
/// The smallest prefix of the parallel-eligible loops whose extent product
/// reaches the task target is split: each task receives a singleton point on
/// those loops and the full range on every other loop. Overshooting the
/// target yields finer-grained tasks and is accepted; if the eligible loops
/// cannot reach the target, the realized task count is their full product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterSpace {
    num_loops: usize,
    num_tasks: usize,
    num_parallel: usize,
    firsts: Vec<i64>,
    sizes: Vec<i64>,
}

impl IterSpace {
    pub fn compile(loop_sizes: &[i64], max_parallel: usize, num_tasks_target: i64) -> Self {
        let num_loops = loop_sizes.len();
        let max_parallel = max_parallel.min(num_loops);

        let mut num_parallel = 0;
        let mut product: i64 = 1;
        while num_parallel < max_parallel && product < num_tasks_target {
            product *= loop_sizes[num_parallel];
            num_parallel += 1;
        }
        if num_tasks_target <= 1 {
            num_parallel = 0;
            product = 1;
        }

        let num_tasks = product.max(1) as usize;
        let mut firsts = vec![0i64; num_tasks * num_loops];
        let mut sizes = vec![0i64; num_tasks * num_loops];

        for task in 0..num_tasks {
            let row = task * num_loops;
            let mut rem = task as i64;
            // decompose the task id over the parallel prefix, outermost first
            for lo in 0..num_parallel {
                let below: i64 = loop_sizes[lo + 1..num_parallel].iter().product();
                firsts[row + lo] = (rem / below) % loop_sizes[lo];
                sizes[row + lo] = 1;
                rem %= below;
            }
            for lo in num_parallel..num_loops {
                firsts[row + lo] = 0;
                sizes[row + lo] = loop_sizes[lo];
            }
        }

        Self { num_loops, num_tasks, num_parallel, firsts, sizes }
    }

    pub fn num_tasks(&self) -> usize {
        self.num_tasks
    }

    /// Number of leading loops that were actually partitioned.
    pub fn num_parallel(&self) -> usize {
        self.num_parallel
    }

    pub fn first(&self, task: usize, loop_id: usize) -> i64 {
        self.firsts[task * self.num_loops + loop_id]
    }

    pub fn size(&self, task: usize, loop_id: usize) -> i64 {
        self.sizes[task * self.num_loops + loop_id]
    }
}
