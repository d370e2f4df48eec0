//! Recovery layer: the validation gate, editor runtimes and bulk recovery.

mod coordinator;
mod gate;
mod runtime;

pub use coordinator::{
    BulkRecovery, DocumentOutcome, DocumentResult, RecoveryError, RecoveryProgress,
    RecoverySettings, RecoveryTally,
};
pub use gate::{AUTO_RECOVER_THRESHOLD, GateError, GateStatus, ValidationGate};
pub use runtime::{EditorRuntime, RenderRepairRuntime, RuntimeError};
