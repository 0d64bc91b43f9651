//! The VM's error codes: every runtime fault halts the current program run
//! and is reported to the host as one of these.

/// A fatal VM runtime fault. Execution halts immediately; the host sees
/// this code and may `unload()` and retry a fresh `load()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmError {
    MemoryOutOfBounds,
    NoSuchSprite,
    UnknownAudioFormat,
    NoSuchMusic,
    NoSuchSound,
    MachineCodeMissingHeader,
    UnknownInstruction,
    /// Division or modulo by zero. Not one of the host-visible codes named
    /// by the error model, but `div`/`mod` need a concrete fault to raise;
    /// modelled as its own variant rather than overloading an unrelated one.
    DivisionByZero,
}

impl std::fmt::Display for VmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            VmError::MemoryOutOfBounds => "memory access out of bounds",
            VmError::NoSuchSprite => "no such sprite",
            VmError::UnknownAudioFormat => "unknown audio format",
            VmError::NoSuchMusic => "no such music track",
            VmError::NoSuchSound => "no such sound",
            VmError::MachineCodeMissingHeader => "machine code missing header",
            VmError::UnknownInstruction => "unknown instruction",
            VmError::DivisionByZero => "division by zero",
        };
        write!(f, "{}", text)
    }
}

impl std::error::Error for VmError {}
