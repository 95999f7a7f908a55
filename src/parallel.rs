//! Worker fan-out for the tile scheduler.
//!
//! The engine only needs one capability from its environment: run the same
//! closure on `n_jobs` workers and return once all of them have returned.
//! Workers coordinate through a shared atomic tile counter, so the closure
//! is identical for every worker and carries no index.
//!
//! Two environments are provided: [`ThreadEnv`] spawns plain scoped threads
//! (self-contained, deterministic worker count), [`RayonEnv`] schedules the
//! workers on the global rayon pool so the layer shares threads with the
//! rest of an application.

/// Provides a parallel-for over symmetric workers.
pub trait ComputeEnv: Sync {
    /// Invoke `body` on `n_jobs` workers; return when all have returned.
    fn parallel_for(&self, n_jobs: usize, body: &(dyn Fn() + Sync));
}

/// Spawns `n_jobs` OS threads per call and joins them.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadEnv;

impl ComputeEnv for ThreadEnv {
    fn parallel_for(&self, n_jobs: usize, body: &(dyn Fn() + Sync)) {
        let n = n_jobs.max(1);
        if n == 1 {
            body();
            return;
        }
        std::thread::scope(|scope| {
            for _ in 0..n {
                scope.spawn(|| body());
            }
        });
    }
}

/// Runs the workers as tasks on the global rayon pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct RayonEnv;

impl ComputeEnv for RayonEnv {
    fn parallel_for(&self, n_jobs: usize, body: &(dyn Fn() + Sync)) {
        let n = n_jobs.max(1);
        if n == 1 {
            body();
            return;
        }
        rayon::scope(|scope| {
            for _ in 0..n {
                scope.spawn(|_| body());
            }
        });
    }
}
