//! Fan-out helper for independent, index-addressed tasks.

/// Run `task(i)` for every `i in 0..count` on up to `workers` scoped
/// threads and return the results in index order.
///
/// Tasks are split into contiguous chunks, one per worker. Because each
/// result lands at its own index, the output is the same for any worker
/// count as long as `task` depends only on its index.
pub fn par_map<T, F>(workers: usize, count: usize, task: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync,
{
    let workers = workers.clamp(1, count.max(1));
    if workers == 1 {
        return (0..count).map(task).collect();
    }

    let chunk = count.div_ceil(workers);
    let task = &task;
    let joined = crossbeam::thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|w| {
                let start = (w * chunk).min(count);
                let end = ((w + 1) * chunk).min(count);
                scope.spawn(move |_| (start..end).map(task).collect::<Vec<T>>())
            })
            .collect();

        let mut out = Vec::with_capacity(count);
        for handle in handles {
            match handle.join() {
                Ok(part) => out.extend(part),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        out
    });

    match joined {
        Ok(out) => out,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_results_in_index_order() {
        let out = par_map(4, 10, |i| i * i);
        assert_eq!(out, (0..10).map(|i| i * i).collect::<Vec<_>>());
    }

    #[test]
    fn test_worker_count_does_not_change_output() {
        let single = par_map(1, 37, |i| (i as f64).sqrt());
        let many = par_map(8, 37, |i| (i as f64).sqrt());
        assert_eq!(single, many);
    }

    #[test]
    fn test_empty_and_oversubscribed() {
        assert!(par_map(4, 0, |i| i).is_empty());
        assert_eq!(par_map(16, 3, |i| i), vec![0, 1, 2]);
    }
}
