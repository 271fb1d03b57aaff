//! Transactional rotation: an ordered list of undoable filesystem
//! operations, executed in order, rolled back in reverse order on the
//! first failure, and committed (backup deleted) on full success.

use std::path::PathBuf;

pub enum OperationKind {
    FileMove,
    FileRename,
    FileDelete,
    DirectoryCreate,
    Compress,
    Custom,
}

type StepFn = Box<dyn FnMut() -> Result<(), String> + Send>;

/// A single undoable step. `forward` performs the operation; `rollback`
/// undoes it. Both are `FnMut` closures captured at build time so a
/// transaction doesn't need a separate "operation context" type.
pub struct RotationOperation {
    pub kind: OperationKind,
    pub source: PathBuf,
    pub target: PathBuf,
    pub backup: Option<PathBuf>,
    forward: StepFn,
    rollback: StepFn,
    pub executed: bool,
    pub success: bool,
    pub error_message: Option<String>,
}

impl RotationOperation {
    pub fn new(
        kind: OperationKind,
        source: PathBuf,
        target: PathBuf,
        backup: Option<PathBuf>,
        forward: StepFn,
        rollback: StepFn,
    ) -> Self {
        RotationOperation { kind, source, target, backup, forward, rollback, executed: false, success: false, error_message: None }
    }

    fn execute(&mut self) {
        self.executed = true;
        match (self.forward)() {
            Ok(()) => self.success = true,
            Err(message) => {
                self.success = false;
                self.error_message = Some(message);
            }
        }
    }

    fn undo(&mut self) {
        let _ = (self.rollback)();
    }
}

pub struct RotationResult {
    pub success: bool,
    pub executed_count: usize,
    pub success_count: usize,
    pub error_message: Option<String>,
}

/// An ordered list of `RotationOperation`s plus the bookkeeping spec §3
/// requires: transaction id, backup directory, and lifecycle state.
pub struct RotationTransaction {
    pub id: u64,
    pub backup_dir: PathBuf,
    operations: Vec<RotationOperation>,
    committed: bool,
}

impl RotationTransaction {
    pub fn new(id: u64, backup_dir: PathBuf, operations: Vec<RotationOperation>) -> Self {
        RotationTransaction { id, backup_dir, operations, committed: false }
    }

    /// Runs every operation in order. On the first failure, already-executed
    /// operations are rolled back in reverse order and the transaction
    /// reports failure. On full success, `commit()` still must be called
    /// explicitly to delete the backup directory.
    pub fn execute(&mut self) -> RotationResult {
        for index in 0..self.operations.len() {
            self.operations[index].execute();
            if !self.operations[index].success {
                let error_message = self.operations[index].error_message.clone();
                self.rollback_executed();
                return RotationResult {
                    success: false,
                    executed_count: self.executed_count(),
                    success_count: self.success_count(),
                    error_message,
                };
            }
        }
        RotationResult { success: true, executed_count: self.executed_count(), success_count: self.success_count(), error_message: None }
    }

    fn rollback_executed(&mut self) {
        for operation in self.operations.iter_mut().rev() {
            if operation.executed && operation.success {
                operation.undo();
            }
        }
    }

    fn executed_count(&self) -> usize {
        self.operations.iter().filter(|op| op.executed).count()
    }

    fn success_count(&self) -> usize {
        self.operations.iter().filter(|op| op.success).count()
    }

    /// Marks this transaction committed, deleting its backup directory if
    /// present. Calling this after a failed `execute()` is a caller error
    /// the rotation manager guards against by only committing on success.
    pub fn commit(&mut self) {
        if self.backup_dir.exists() {
            let _ = std::fs::remove_dir_all(&self.backup_dir);
        }
        self.committed = true;
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }
}

impl Drop for RotationTransaction {
    /// An executed-but-uncommitted transaction cleans up its own backup on
    /// destruction (spec §3: "Uncommitted executed transactions clean up
    /// their backups on destruction").
    fn drop(&mut self) {
        if !self.committed && self.backup_dir.exists() {
            let _ = std::fs::remove_dir_all(&self.backup_dir);
        }
    }
}
