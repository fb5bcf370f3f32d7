//! # Simulated Kernel
//!
//! This crate provides a simulated process table that drives the
//! namespace bundle core.
//!
//! ## Purpose
//!
//! The simulated kernel allows testing bundle behavior without hardware:
//! - Runs under `cargo test`
//! - Thread-safe, so tests can race real threads against each other
//! - Inspectable (every task, bundle and namespace is reachable)
//! - Audited (every change and every refusal lands in [`NsAuditLog`])
//!
//! ## Philosophy
//!
//! **Testability is a first-class design constraint.**
//!
//! Each task owns credentials, a filesystem context and an
//! [`NsSlot`](nsproxy::NsSlot).
//! A task acting on itself holds its run lock, which stands in for
//! "being the current task": only then does it switch its own slot.
//! Every other access goes through the slot's inspection path.

pub mod audit;
pub mod config;
pub mod error;
pub mod fault_injection;
pub mod task;

pub use audit::{NsAuditEvent, NsAuditLog, NsEvent, NsOperation};
pub use config::KernelConfig;
pub use error::{ConfigError, KernelError};
pub use fault_injection::{FaultInjectingOps, FaultPlan, NamespaceFault};
pub use task::Task;

use core_types::{NamespaceKind, NamespaceType, TaskId};
use identity::{init_user_ns, Credentials, Gid, Uid, UserNamespace};
use namespaces::{Namespace, NamespaceOps, StandardNamespaces};
use nsproxy::{
    commit_nsset, copy_namespaces, exit_task_namespaces, init_nsproxy, prepare_nsset,
    unshare_nsproxy_namespaces, CloneFlags, Committed, FsContext, NsBundle,
};
use spin::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Simulated kernel state
pub struct SimulatedKernel {
    config: KernelConfig,
    root_user_ns: Arc<UserNamespace>,
    init_bundle: Arc<NsBundle>,
    init_task: TaskId,
    tasks: RwLock<HashMap<TaskId, Arc<Task>>>,
    ops: Arc<dyn NamespaceOps>,
    audit: NsAuditLog,
}

impl SimulatedKernel {
    /// Creates a kernel on the global initial user namespace and bundle
    pub fn new() -> Self {
        Self::build(
            KernelConfig::default(),
            Arc::clone(init_user_ns()),
            Arc::clone(init_nsproxy()),
        )
    }

    /// Creates a kernel with its own root user namespace and initial
    /// bundle, configured by `config`
    pub fn with_config(config: KernelConfig) -> Self {
        let root = UserNamespace::new_root(config.limits);
        let bundle = NsBundle::initial(&root);
        Self::build(config, root, bundle)
    }

    fn build(
        config: KernelConfig,
        root_user_ns: Arc<UserNamespace>,
        init_bundle: Arc<NsBundle>,
    ) -> Self {
        let mut cred = Credentials::root(Arc::clone(&root_user_ns));
        cred.uid = Uid(config.init_uid);
        cred.euid = Uid(config.init_uid);
        cred.gid = Gid(config.init_gid);
        cred.egid = Gid(config.init_gid);

        let init_task = TaskId::new();
        let task = Task::new(
            init_task,
            None,
            Arc::new(cred),
            FsContext::new(init_bundle.mnt_ns()),
            Arc::clone(&init_bundle),
        );
        let mut tasks = HashMap::new();
        tasks.insert(init_task, Arc::new(task));

        Self {
            config,
            root_user_ns,
            init_bundle,
            init_task,
            tasks: RwLock::new(tasks),
            ops: Arc::new(StandardNamespaces::new()),
            audit: NsAuditLog::new(),
        }
    }

    /// Replaces the namespace operations used for every request
    pub fn with_namespace_ops(mut self, ops: Arc<dyn NamespaceOps>) -> Self {
        self.ops = ops;
        self
    }

    /// Injects the faults of `plan` into namespace operations
    pub fn with_fault_plan(self, plan: FaultPlan) -> Self {
        self.with_namespace_ops(Arc::new(FaultInjectingOps::new(plan)))
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn root_user_ns(&self) -> &Arc<UserNamespace> {
        &self.root_user_ns
    }

    pub fn init_bundle(&self) -> &Arc<NsBundle> {
        &self.init_bundle
    }

    pub fn init_task(&self) -> TaskId {
        self.init_task
    }

    pub fn audit(&self) -> &NsAuditLog {
        &self.audit
    }

    pub fn task(&self, id: TaskId) -> Result<Arc<Task>, KernelError> {
        self.tasks
            .read()
            .get(&id)
            .cloned()
            .ok_or(KernelError::TaskNotFound(id))
    }

    /// Tasks that have not exited
    pub fn live_tasks(&self) -> Vec<TaskId> {
        self.tasks
            .read()
            .values()
            .filter(|t| !t.has_exited())
            .map(|t| t.id())
            .collect()
    }

    /// Creates a child of `parent`
    ///
    /// Namespace bits in `flags` give the child new namespaces of those
    /// kinds; otherwise it shares its parent's bundle.
    pub fn spawn(&self, parent: TaskId, flags: CloneFlags) -> Result<TaskId, KernelError> {
        let result = self.task(parent).and_then(|p| self.spawn_from(&p, flags));
        self.audited(parent, NsOperation::Spawn, result)
    }

    fn spawn_from(&self, parent: &Task, flags: CloneFlags) -> Result<TaskId, KernelError> {
        let _running = parent.run();
        let bundle = parent
            .nsproxy()
            .current()
            .ok_or(KernelError::TaskExited(parent.id()))?;
        let cred = parent.cred();
        let nsset = copy_namespaces(flags, &bundle, &cred, &parent.fs(), self.ops.as_ref())?;

        let (child_bundle, staged, fs) = nsset.into_parts();
        let shared = Arc::ptr_eq(&child_bundle, &bundle);
        let bundle_id = child_bundle.id();
        let cred = staged.map(Arc::new).unwrap_or(cred);

        let id = TaskId::new();
        let child = Task::new(id, Some(parent.id()), cred, fs, child_bundle);
        self.tasks.write().insert(id, Arc::new(child));

        log::debug!("spawned {} from {} with {}", id, parent.id(), bundle_id);
        self.audit.record(NsEvent::Spawned {
            parent: parent.id(),
            child: id,
            bundle: bundle_id,
            shared,
        });
        Ok(id)
    }

    /// Gives `task` new namespaces of the kinds in `flags`
    pub fn unshare(&self, task: TaskId, flags: CloneFlags) -> Result<(), KernelError> {
        let result = self.task(task).and_then(|t| self.unshare_task(&t, flags));
        self.audited(task, NsOperation::Unshare, result)
    }

    fn unshare_task(&self, task: &Task, flags: CloneFlags) -> Result<(), KernelError> {
        let _running = task.run();
        let current = task
            .nsproxy()
            .current()
            .ok_or(KernelError::TaskExited(task.id()))?;
        let nsset = unshare_nsproxy_namespaces(
            flags,
            &current,
            &task.cred(),
            &task.fs(),
            self.ops.as_ref(),
        )?;
        let Some(nsset) = nsset else {
            return Ok(());
        };

        let to = nsset.nsproxy().id();
        let committed =
            commit_nsset(task.nsproxy(), nsset).ok_or(KernelError::TaskExited(task.id()))?;
        Self::publish(task, committed);
        self.audit.record(NsEvent::Unshared {
            task: task.id(),
            from: current.id(),
            to,
        });
        Ok(())
    }

    /// Moves `task` into the namespaces of `target` selected by `flags`
    ///
    /// `target`'s bundle is read through the inspection path. With
    /// `NEWUSER`, `task` also enters `target`'s user namespace first.
    pub fn setns(&self, task: TaskId, target: TaskId, flags: CloneFlags) -> Result<(), KernelError> {
        let result = self
            .task(task)
            .and_then(|t| self.task(target).map(|target| (t, target)))
            .and_then(|(t, target)| self.enter(&t, &target, flags));
        self.audited(task, NsOperation::Setns, result)
    }

    fn enter(&self, task: &Task, target: &Task, flags: CloneFlags) -> Result<(), KernelError> {
        let target_bundle = target
            .nsproxy()
            .inspect()
            .ok_or(KernelError::TaskExited(target.id()))?;
        let target_user_ns = Arc::clone(target.cred().user_ns());

        let _running = task.run();
        let current = task
            .nsproxy()
            .current()
            .ok_or(KernelError::TaskExited(task.id()))?;
        let mut nsset =
            prepare_nsset(flags, &current, &task.cred(), &task.fs(), self.ops.as_ref())?;

        if flags.contains(CloneFlags::NEWUSER) {
            nsset.install_user_ns(&target_user_ns)?;
        }
        for ty in NamespaceType::ALL {
            let Some(kind) = entered_kind(ty) else {
                continue;
            };
            if flags.contains(CloneFlags::for_type(ty)) {
                nsset.install(target_bundle.member(kind), self.ops.as_ref())?;
            }
        }

        let to = nsset.nsproxy().id();
        let committed =
            commit_nsset(task.nsproxy(), nsset).ok_or(KernelError::TaskExited(task.id()))?;
        Self::publish(task, committed);
        self.audit.record(NsEvent::Entered {
            task: task.id(),
            target: target.id(),
            from: current.id(),
            to,
        });
        Ok(())
    }

    /// Tears down the namespaces of `task`
    ///
    /// The task stays in the table as exited; exiting again reports
    /// [`KernelError::TaskExited`].
    pub fn exit(&self, task: TaskId) -> Result<(), KernelError> {
        let result = self.task(task).and_then(|t| self.exit_task(&t));
        self.audited(task, NsOperation::Exit, result)
    }

    fn exit_task(&self, task: &Task) -> Result<(), KernelError> {
        let _running = task.run();
        let exited = KernelError::TaskExited(task.id());
        let bundle = task.nsproxy().with_bundle(|b| b.id()).ok_or_else(|| exited.clone())?;
        if !exit_task_namespaces(task.nsproxy()) {
            return Err(exited);
        }
        self.audit.record(NsEvent::Exited {
            task: task.id(),
            bundle,
        });
        Ok(())
    }

    /// Removes an exited task from the table, releasing its credentials
    pub fn reap(&self, task: TaskId) -> Result<(), KernelError> {
        let mut tasks = self.tasks.write();
        match tasks.get(&task) {
            None => Err(KernelError::TaskNotFound(task)),
            Some(t) if !t.has_exited() => Err(KernelError::TaskRunning(task)),
            Some(_) => {
                tasks.remove(&task);
                Ok(())
            }
        }
    }

    /// Tasks that have exited but are not reaped yet
    pub fn exited_tasks(&self) -> Vec<TaskId> {
        self.tasks
            .read()
            .values()
            .filter(|t| t.has_exited())
            .map(|t| t.id())
            .collect()
    }

    /// Another task's bundle
    ///
    /// `Ok(None)` means the task has exited and is no longer inspectable.
    pub fn inspect(&self, task: TaskId) -> Result<Option<Arc<NsBundle>>, KernelError> {
        Ok(self.task(task)?.nsproxy().inspect())
    }

    /// One member of another task's bundle; `Ok(None)` once it has exited
    pub fn inspect_member(
        &self,
        task: TaskId,
        kind: NamespaceKind,
    ) -> Result<Option<Arc<Namespace>>, KernelError> {
        Ok(self.task(task)?.nsproxy().inspect_member(kind))
    }

    /// Replaces the credentials of `task`
    pub fn set_credentials(&self, task: TaskId, cred: Credentials) -> Result<(), KernelError> {
        let task = self.task(task)?;
        let _running = task.run();
        task.set_cred(Arc::new(cred));
        Ok(())
    }

    fn publish(task: &Task, committed: Committed) {
        if let Some(cred) = committed.cred {
            task.set_cred(Arc::new(cred));
        }
        task.set_fs(committed.fs);
    }

    fn audited<T>(
        &self,
        task: TaskId,
        operation: NsOperation,
        result: Result<T, KernelError>,
    ) -> Result<T, KernelError> {
        if let Err(err) = &result {
            log::debug!("{:?} by {} refused: {}", operation, task, err);
            self.audit.record(NsEvent::Refused {
                task,
                operation,
                reason: err.to_string(),
            });
        }
        result
    }
}

impl Default for SimulatedKernel {
    fn default() -> Self {
        Self::new()
    }
}

/// Member of the target's bundle entered for namespace type `ty`
fn entered_kind(ty: NamespaceType) -> Option<NamespaceKind> {
    match ty {
        NamespaceType::User => None,
        NamespaceType::Mount => Some(NamespaceKind::Mount),
        NamespaceType::Uts => Some(NamespaceKind::Uts),
        NamespaceType::Ipc => Some(NamespaceKind::Ipc),
        NamespaceType::Pid => Some(NamespaceKind::PidForChildren),
        NamespaceType::Net => Some(NamespaceKind::Net),
        NamespaceType::Time => Some(NamespaceKind::Time),
        NamespaceType::Cgroup => Some(NamespaceKind::Cgroup),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use identity::CapabilitySet;
    use nsproxy::{NsError, NsErrorKind};
    use resources::NamespaceLimits;

    fn kernel() -> SimulatedKernel {
        SimulatedKernel::with_config(KernelConfig::default())
    }

    #[test]
    fn test_kernel_creation() {
        let k = kernel();
        let init = k.init_task();
        assert_eq!(k.live_tasks(), vec![init]);
        assert!(Arc::ptr_eq(&k.inspect(init).unwrap().unwrap(), k.init_bundle()));
        assert!(k.audit().is_empty());
    }

    #[test]
    fn test_global_kernel_uses_init_bundle() {
        let k = SimulatedKernel::new();
        assert!(Arc::ptr_eq(k.init_bundle(), init_nsproxy()));
        assert!(Arc::ptr_eq(k.root_user_ns(), init_user_ns()));
    }

    #[test]
    fn test_spawn_shares_bundle() {
        let k = kernel();
        let child = k.spawn(k.init_task(), CloneFlags::empty()).unwrap();
        assert!(Arc::ptr_eq(&k.inspect(child).unwrap().unwrap(), k.init_bundle()));
        assert!(k
            .audit()
            .has_event(|e| matches!(e, NsEvent::Spawned { shared: true, .. })));
    }

    #[test]
    fn test_unshare_replaces_only_own_bundle() {
        let k = kernel();
        let a = k.spawn(k.init_task(), CloneFlags::empty()).unwrap();
        let b = k.spawn(k.init_task(), CloneFlags::empty()).unwrap();
        k.unshare(a, CloneFlags::NEWUTS).unwrap();

        let bundle_a = k.inspect(a).unwrap().unwrap();
        let bundle_b = k.inspect(b).unwrap().unwrap();
        assert!(!Arc::ptr_eq(&bundle_a, &bundle_b));
        assert!(Arc::ptr_eq(&bundle_b, k.init_bundle()));
        assert!(!bundle_a.shares_with(&bundle_b, NamespaceKind::Uts));
        assert!(bundle_a.shares_with(&bundle_b, NamespaceKind::Net));
    }

    #[test]
    fn test_unshare_user_ns_publishes_cred() {
        let k = kernel();
        let user = k.spawn(k.init_task(), CloneFlags::empty()).unwrap();
        k.set_credentials(
            user,
            Credentials::unprivileged(Uid(1000), Gid(1000), Arc::clone(k.root_user_ns())),
        )
        .unwrap();

        k.unshare(user, CloneFlags::NEWUSER | CloneFlags::NEWNS).unwrap();
        let task = k.task(user).unwrap();
        let cred = task.cred();
        assert_eq!(cred.user_ns().level(), 1);
        assert!(cred.capable(CapabilitySet::SYS_ADMIN));
        assert_eq!(task.fs().mount_ns, k.inspect(user).unwrap().unwrap().mnt_ns().id());
    }

    #[test]
    fn test_refusal_is_audited() {
        let k = kernel();
        let user = k.spawn(k.init_task(), CloneFlags::empty()).unwrap();
        k.set_credentials(
            user,
            Credentials::unprivileged(Uid(1000), Gid(1000), Arc::clone(k.root_user_ns())),
        )
        .unwrap();

        let err = k.unshare(user, CloneFlags::NEWNET).unwrap_err();
        assert_eq!(
            err,
            KernelError::Namespace(NsError::PermissionDenied { ty: NamespaceType::Net })
        );
        assert!(Arc::ptr_eq(&k.inspect(user).unwrap().unwrap(), k.init_bundle()));
        assert!(k.audit().has_event(|e| matches!(
            e,
            NsEvent::Refused {
                operation: NsOperation::Unshare,
                ..
            }
        )));
    }

    #[test]
    fn test_exit_twice() {
        let k = kernel();
        let child = k.spawn(k.init_task(), CloneFlags::NEWIPC).unwrap();
        let bundle = Arc::downgrade(&k.inspect(child).unwrap().unwrap());
        k.exit(child).unwrap();
        assert!(bundle.upgrade().is_none());
        assert_eq!(k.exit(child).unwrap_err(), KernelError::TaskExited(child));
        // An exited task is still known; its slot is simply empty.
        assert!(k.inspect(child).unwrap().is_none());
        assert!(k.inspect_member(child, NamespaceKind::Ipc).unwrap().is_none());
        let stranger = TaskId::new();
        assert_eq!(
            k.inspect(stranger).unwrap_err(),
            KernelError::TaskNotFound(stranger)
        );
        assert!(!k.live_tasks().contains(&child));
        assert!(k.root_user_ns().counts().is_idle());
    }

    #[test]
    fn test_reap() {
        let k = kernel();
        let child = k.spawn(k.init_task(), CloneFlags::NEWUSER).unwrap();
        assert_eq!(k.reap(child).unwrap_err(), KernelError::TaskRunning(child));
        k.exit(child).unwrap();
        assert_eq!(k.exited_tasks(), vec![child]);
        k.reap(child).unwrap();
        assert_eq!(k.task(child).unwrap_err(), KernelError::TaskNotFound(child));
        assert!(k.root_user_ns().counts().is_idle());
    }

    #[test]
    fn test_spawn_from_exited_parent() {
        let k = kernel();
        let parent = k.spawn(k.init_task(), CloneFlags::empty()).unwrap();
        k.exit(parent).unwrap();
        assert_eq!(
            k.spawn(parent, CloneFlags::empty()).unwrap_err(),
            KernelError::TaskExited(parent)
        );
    }

    #[test]
    fn test_unknown_task() {
        let k = kernel();
        let ghost = TaskId::new();
        assert_eq!(k.task(ghost).unwrap_err(), KernelError::TaskNotFound(ghost));
        assert_eq!(
            k.unshare(ghost, CloneFlags::NEWNS).unwrap_err(),
            KernelError::TaskNotFound(ghost)
        );
    }

    #[test]
    fn test_setns_into_sibling() {
        let k = kernel();
        let a = k.spawn(k.init_task(), CloneFlags::NEWNET | CloneFlags::NEWUTS).unwrap();
        let b = k.spawn(k.init_task(), CloneFlags::empty()).unwrap();

        k.setns(b, a, CloneFlags::NEWNET).unwrap();
        let bundle_a = k.inspect(a).unwrap().unwrap();
        let bundle_b = k.inspect(b).unwrap().unwrap();
        assert!(bundle_a.shares_with(&bundle_b, NamespaceKind::Net));
        assert!(!bundle_a.shares_with(&bundle_b, NamespaceKind::Uts));
        assert!(k.audit().has_event(|e| matches!(e, NsEvent::Entered { .. })));
    }

    #[test]
    fn test_setns_into_exited_task() {
        let k = kernel();
        let a = k.spawn(k.init_task(), CloneFlags::NEWNET).unwrap();
        k.exit(a).unwrap();
        assert_eq!(
            k.setns(k.init_task(), a, CloneFlags::NEWNET).unwrap_err(),
            KernelError::TaskExited(a)
        );
    }

    #[test]
    fn test_limits_from_config() {
        let config = KernelConfig::default()
            .with_limits(NamespaceLimits::default().with_limit(NamespaceType::Net, 1));
        let k = SimulatedKernel::with_config(config);
        let first = k.spawn(k.init_task(), CloneFlags::NEWNET).unwrap();
        let err = k.spawn(k.init_task(), CloneFlags::NEWNET).unwrap_err();
        match err {
            KernelError::Namespace(ns) => assert_eq!(ns.kind(), NsErrorKind::ResourceLimit),
            other => panic!("unexpected error: {}", other),
        }
        k.exit(first).unwrap();
        assert!(k.spawn(k.init_task(), CloneFlags::NEWNET).is_ok());
    }

    #[test]
    fn test_fault_plan_failure_leaves_no_task() {
        let k = kernel().with_fault_plan(
            FaultPlan::new().with_fault(NamespaceFault::FailType { ty: NamespaceType::Cgroup }),
        );
        let before = k.live_tasks().len();
        assert!(k
            .spawn(k.init_task(), CloneFlags::NEWNS | CloneFlags::NEWCGROUP)
            .is_err());
        assert_eq!(k.live_tasks().len(), before);
        assert!(k.root_user_ns().counts().is_idle());
        assert_eq!(NsBundle::refcount(k.init_bundle()), 2);
    }
}
