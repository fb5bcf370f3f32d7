//! Resilience Test Utilities
//!
//! This crate provides shared utilities for namespace integration and
//! stress tests.
//!
//! ## Test Philosophy
//!
//! - **Safety under faults**: a failed request leaves every count where it was
//! - **Deterministic failures**: all faults are reproducible via `FaultPlan`
//!   and seeded random schedules
//! - **No leaks**: every namespace charge returns to zero once its tasks exit
//! - **Consistency**: bundle reference counts always match the slots that hold them

use core_types::TaskId;
use identity::{Credentials, Gid, Uid};
use nsproxy::{CloneFlags, NsBundle};
use sim_kernel::{KernelConfig, KernelError, SimulatedKernel};
use std::collections::HashMap;
use std::sync::Arc;

/// Bootstrap helper for tests
///
/// Creates a kernel with its own root user namespace, so counters start
/// at zero regardless of what other tests do.
pub fn test_bootstrap() -> SimulatedKernel {
    SimulatedKernel::with_config(KernelConfig::default())
}

/// Spawns a child of init and drops it to an unprivileged uid
pub fn spawn_unprivileged(kernel: &SimulatedKernel, uid: u32) -> Result<TaskId, KernelError> {
    let task = kernel.spawn(kernel.init_task(), CloneFlags::empty())?;
    kernel.set_credentials(
        task,
        Credentials::unprivileged(Uid(uid), Gid(uid), Arc::clone(kernel.root_user_ns())),
    )?;
    Ok(task)
}

/// Namespace flags a privileged task may combine freely
pub const BUNDLE_FLAGS: [CloneFlags; 7] = [
    CloneFlags::NEWNS,
    CloneFlags::NEWUTS,
    CloneFlags::NEWIPC,
    CloneFlags::NEWPID,
    CloneFlags::NEWNET,
    CloneFlags::NEWTIME,
    CloneFlags::NEWCGROUP,
];

/// Checks that every live bundle is held exactly by the slots pointing
/// at it (plus the kernel's own reference to its initial bundle)
pub fn assert_refcounts_conserved(kernel: &SimulatedKernel) {
    let mut holders: HashMap<u64, (Arc<NsBundle>, usize)> = HashMap::new();
    for task in kernel.live_tasks() {
        let Ok(Some(bundle)) = kernel.inspect(task) else {
            continue;
        };
        holders
            .entry(bundle.id().as_u64())
            .or_insert_with(|| (bundle, 0))
            .1 += 1;
    }

    for (bundle, slots) in holders.values() {
        let kernel_ref = usize::from(Arc::ptr_eq(bundle, kernel.init_bundle()));
        // One more for the reference held in `holders` itself.
        assert_eq!(
            NsBundle::refcount(bundle),
            slots + kernel_ref + 1,
            "{} refcount does not match its slots",
            bundle
        );
    }
}

/// Small deterministic PRNG for stress schedules
#[derive(Debug, Clone)]
pub struct XorShift(u64);

impl XorShift {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    /// Uniform-ish value in `0..n`
    pub fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }

    /// Random subset of [`BUNDLE_FLAGS`]
    pub fn bundle_flags(&mut self) -> CloneFlags {
        BUNDLE_FLAGS
            .iter()
            .filter(|_| self.next_u64() % 4 == 0)
            .fold(CloneFlags::empty(), |acc, f| acc | *f)
    }
}
