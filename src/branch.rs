//! Types for representing instruction events and branch outcomes.

/// A branch outcome.
#[repr(u32)]
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Outcome {
    /// Not taken
    N = 0,
    /// Taken
    T = 1,
}

impl Outcome {
    pub fn from_bool(b: bool) -> Self {
        match b {
            true => Self::T,
            false => Self::N,
        }
    }
}

impl std::fmt::Debug for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            Self::T => "t",
            Self::N => "n",
        };
        write!(f, "{}", s)
    }
}

impl std::ops::Not for Outcome {
    type Output = Self;
    fn not(self) -> Self {
        match self {
            Self::N => Self::T,
            Self::T => Self::N,
        }
    }
}

impl From<bool> for Outcome {
    fn from(x: bool) -> Self {
        match x {
            true => Self::T,
            false => Self::N,
        }
    }
}
impl From<Outcome> for bool {
    fn from(x: Outcome) -> bool {
        match x {
            Outcome::T => true,
            Outcome::N => false,
        }
    }
}

/// Packed per-instruction flags.
///
/// NOTE: This layout is shared with the packed on-disk trace format
/// (see [`crate::trace`]); bits 4 through 27 are reserved.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct InstFlags(pub u32);
impl InstFlags {
    const CALL_FLAG: u32 = (1 << 0);
    const RET_FLAG: u32 = (1 << 1);
    const CFL_FLAG: u32 = (1 << 2);
    const TAKEN_FLAG: u32 = (1 << 3);

    /// 4-bit instruction length
    const ILEN_MASK: u32 = 0b1111_0000_0000_0000_0000_0000_0000_0000;

    pub fn pack(ilen: usize, is_call: bool, is_ret: bool, is_cfl: bool, taken: bool) -> Self {
        let mut bits = ((ilen as u32) & 0b1111) << 28;
        if is_call {
            bits |= Self::CALL_FLAG;
        }
        if is_ret {
            bits |= Self::RET_FLAG;
        }
        if is_cfl {
            bits |= Self::CFL_FLAG;
        }
        if taken {
            bits |= Self::TAKEN_FLAG;
        }
        Self(bits)
    }

    pub fn ilen(&self) -> usize {
        ((self.0 & Self::ILEN_MASK) >> 28) as usize
    }

    pub fn is_call(&self) -> bool {
        self.0 & Self::CALL_FLAG != 0
    }
    pub fn is_ret(&self) -> bool {
        self.0 & Self::RET_FLAG != 0
    }
    pub fn is_control_flow(&self) -> bool {
        self.0 & Self::CFL_FLAG != 0
    }
    pub fn is_taken(&self) -> bool {
        self.0 & Self::TAKEN_FLAG != 0
    }
}

/// A record of instruction execution.
///
/// The simulator sees one of these for *every* executed instruction, not
/// only for control-flow instructions; `tgt` is meaningful only when the
/// instruction actually transfers control.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct InstRecord {
    /// The program counter value for this instruction
    pub pc: usize,

    /// The target address evaluated for this instruction, **if taken**
    pub tgt: usize,

    pub flags: InstFlags,
}
impl InstRecord {
    pub fn new(pc: usize, tgt: usize, flags: InstFlags) -> Self {
        Self { pc, tgt, flags }
    }

    pub fn outcome(&self) -> Outcome {
        Outcome::from_bool(self.flags.is_taken())
    }
    pub fn ilen(&self) -> usize {
        self.flags.ilen()
    }

    /// The address of the next sequential instruction.
    ///
    /// For subroutine calls, this doubles as the return address.
    pub fn fallthrough(&self) -> usize {
        self.pc + self.ilen()
    }

    /// Returns 'true' if this is a subroutine call.
    pub fn is_call(&self) -> bool {
        self.flags.is_call()
    }

    /// Returns 'true' if this is a subroutine return.
    pub fn is_return(&self) -> bool {
        self.flags.is_ret()
    }

    /// Returns 'true' if this instruction may change control flow.
    pub fn is_control_flow(&self) -> bool {
        self.flags.is_control_flow()
    }
}
