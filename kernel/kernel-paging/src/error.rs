use crate::process::Pid;
use core::fmt;

/// Caller-visible failures of the virtual-memory API.
///
/// These carry no side effects: the operation rejected its arguments or ran
/// out of a resource before touching any state.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
pub enum VmError {
    /// Null pointer, zero size, misaligned/partial free span, or a span not
    /// made of whole allocations.
    #[error("invalid argument")]
    InvalidArgument,

    /// No free region large enough, or no frame for a new page directory.
    #[error("out of memory")]
    OutOfMemory,

    /// The calling process has no virtual heap.
    #[error("not a user process")]
    NotUserProcess,

    /// Unknown or dead process id.
    #[error("bad pid")]
    BadPid,

    /// No free process-table slot.
    #[error("process table full")]
    ProcessTableFull,
}

/// Why a process was killed by the fault handler.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum KillReason {
    /// The faulting page lies in no allocated region, or the walk could not
    /// get a page-table frame.
    SegmentationFault,
    /// FFS exhausted with no way to evict.
    OutOfMemory,
}

impl fmt::Display for KillReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SegmentationFault => f.write_str("SEGMENTATION_FAULT"),
            Self::OutOfMemory => f.write_str("OUT_OF_MEMORY"),
        }
    }
}

/// Returned by the access wrappers when the fault handler killed the process
/// instead of repairing the fault.
#[derive(Copy, Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{pid}:: {reason}")]
pub struct ProcessKilled {
    pub pid: Pid,
    pub reason: KillReason,
}
