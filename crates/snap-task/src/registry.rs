//! Explicit task and reduction-operator registry.
//!
//! Every task kind and reduction operator the program uses is registered
//! here during startup. The runtime takes the registry by value when it is
//! built, so registration always happens before the first dispatch.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use smallvec::SmallVec;
use snap_core::{Redop, ReductionId, RegistryError, TaskError, TaskId, VariantKind};

use crate::context::{TaskContext, TaskInfo};
use crate::physical::PhysicalRegion;
use crate::reduction::{builtin_reductions, ReductionOp};
use crate::task::SnapTask;

/// Type-erased callback stored for one variant of a task kind.
pub type TaskCallback = Arc<
    dyn Fn(
            &TaskInfo,
            &(dyn Any + Send + Sync),
            &mut [PhysicalRegion],
            &TaskContext<'_>,
        ) -> Result<(), TaskError>
        + Send
        + Sync,
>;

/// One executable variant of a task kind.
#[derive(Clone)]
pub struct TaskVariant {
    kind: VariantKind,
    callback: TaskCallback,
}

impl TaskVariant {
    /// Processor kind this variant runs on.
    pub fn kind(&self) -> VariantKind {
        self.kind
    }

    /// The callback.
    pub fn callback(&self) -> &TaskCallback {
        &self.callback
    }
}

impl fmt::Debug for TaskVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskVariant")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// A registered task kind and its variants.
#[derive(Clone, Debug)]
pub struct RegisteredTask {
    id: TaskId,
    name: String,
    redop: Redop,
    rust_type: Option<TypeId>,
    variants: SmallVec<[TaskVariant; 2]>,
}

impl RegisteredTask {
    /// Task kind id.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Task kind name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Registered reduction operator.
    pub fn redop(&self) -> Redop {
        self.redop
    }

    /// The variant for `kind`, if one is registered.
    pub fn variant(&self, kind: VariantKind) -> Option<&TaskVariant> {
        self.variants.iter().find(|v| v.kind == kind)
    }

    /// All registered variants.
    pub fn variants(&self) -> &[TaskVariant] {
        &self.variants
    }

    fn same_kind(&self, name: &str, redop: Redop, rust_type: Option<TypeId>) -> bool {
        match (self.rust_type, rust_type) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.name == name && self.redop == redop,
            _ => false,
        }
    }
}

/// Registry of task kinds and reduction operators.
///
/// Starts with the built-in reductions (sum, prod, max, min). Task
/// registration is idempotent per kind and variant; a second kind
/// claiming a taken id is rejected.
#[derive(Clone, Debug)]
pub struct TaskRegistry {
    tasks: IndexMap<TaskId, RegisteredTask>,
    reductions: IndexMap<ReductionId, ReductionOp>,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    /// A registry holding only the built-in reductions.
    pub fn new() -> Self {
        let reductions = builtin_reductions().into_iter().map(|op| (op.id(), op)).collect();
        Self {
            tasks: IndexMap::new(),
            reductions,
        }
    }

    /// Add a reduction operator.
    ///
    /// Re-registering the identical operator is a no-op.
    pub fn register_reduction(&mut self, op: ReductionOp) -> Result<(), RegistryError> {
        if let Some(existing) = self.reductions.get(&op.id()) {
            if existing.same_as(&op) {
                return Ok(());
            }
            return Err(RegistryError::DuplicateReductionId {
                redop: op.id(),
                existing: existing.name().to_string(),
                incoming: op.name().to_string(),
            });
        }
        self.reductions.insert(op.id(), op);
        Ok(())
    }

    /// Register the CPU variant of task kind `T`.
    ///
    /// Calling this twice for the same `T` is a no-op.
    pub fn register_cpu_variant<T: SnapTask>(&mut self) -> Result<(), RegistryError> {
        let callback: TaskCallback = Arc::new(
            |info: &TaskInfo,
             args: &(dyn Any + Send + Sync),
             regions: &mut [PhysicalRegion],
             ctx: &TaskContext<'_>| {
                let args = args.downcast_ref::<T::Args>().ok_or_else(|| {
                    TaskError::ExecutionFailed {
                        reason: format!(
                            "arguments for '{}' are not {}",
                            T::NAME,
                            std::any::type_name::<T::Args>()
                        ),
                    }
                })?;
                T::cpu_implementation(info, args, regions, ctx)
            },
        );
        self.insert(
            T::TASK_ID,
            T::NAME,
            T::REDOP,
            Some(TypeId::of::<T>()),
            VariantKind::Cpu,
            callback,
        )
    }

    /// Register a variant from a bare callback.
    ///
    /// Kinds registered this way are identified by name and redop: the same
    /// pair re-registering under the same id is accepted, adding the
    /// variant if it is new.
    pub fn register_raw(
        &mut self,
        id: TaskId,
        name: &str,
        redop: Redop,
        kind: VariantKind,
        callback: TaskCallback,
    ) -> Result<(), RegistryError> {
        self.insert(id, name, redop, None, kind, callback)
    }

    fn insert(
        &mut self,
        id: TaskId,
        name: &str,
        redop: Redop,
        rust_type: Option<TypeId>,
        kind: VariantKind,
        callback: TaskCallback,
    ) -> Result<(), RegistryError> {
        match self.tasks.get_mut(&id) {
            Some(existing) => {
                if !existing.same_kind(name, redop, rust_type) {
                    return Err(RegistryError::DuplicateTaskId {
                        task: id,
                        existing: existing.name.clone(),
                        incoming: name.to_string(),
                    });
                }
                if existing.variant(kind).is_none() {
                    existing.variants.push(TaskVariant { kind, callback });
                    tracing::debug!(task = %id, name, %kind, "registered variant");
                }
            }
            None => {
                let mut variants = SmallVec::new();
                variants.push(TaskVariant { kind, callback });
                self.tasks.insert(
                    id,
                    RegisteredTask {
                        id,
                        name: name.to_string(),
                        redop,
                        rust_type,
                        variants,
                    },
                );
                tracing::debug!(task = %id, name, %redop, %kind, "registered task");
            }
        }
        Ok(())
    }

    /// Check cross-references: every reducing task names a registered
    /// operator.
    pub fn validate(&self) -> Result<(), RegistryError> {
        for task in self.tasks.values() {
            if let Redop::Reduce(op) = task.redop {
                if !self.reductions.contains_key(&op) {
                    return Err(RegistryError::UnknownReduction {
                        task: task.name.clone(),
                        redop: op,
                    });
                }
            }
        }
        Ok(())
    }

    /// Look up a task kind.
    pub fn get(&self, id: TaskId) -> Option<&RegisteredTask> {
        self.tasks.get(&id)
    }

    /// Look up a reduction operator.
    pub fn reduction(&self, id: ReductionId) -> Option<ReductionOp> {
        self.reductions.get(&id).copied()
    }

    /// Registered task ids in registration order.
    pub fn task_ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.tasks.keys().copied()
    }

    /// Number of registered task kinds.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no task kinds are registered.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
