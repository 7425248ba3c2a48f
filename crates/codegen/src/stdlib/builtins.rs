//! Builtin registry - members of the builtin receiver that compile to
//! `CALL_NATIVE` with a fixed native id

use std::collections::HashMap;
use std::ops::RangeInclusive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Builtin {
    /// Print a value
    Out,
    /// Read a value
    In,
    TudaSyuda,
    Max,
    Min,
}

impl Builtin {
    /// Id the VM dispatches `CALL_NATIVE` on.
    pub fn native_id(self) -> u8 {
        match self {
            Builtin::Out => 1,
            Builtin::In => 2,
            Builtin::TudaSyuda => 3,
            Builtin::Max => 4,
            Builtin::Min => 5,
        }
    }

    pub fn from_native_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Builtin::Out),
            2 => Some(Builtin::In),
            3 => Some(Builtin::TudaSyuda),
            4 => Some(Builtin::Max),
            5 => Some(Builtin::Min),
            _ => None,
        }
    }

    /// Member name as written after the receiver.
    pub fn member(self) -> &'static str {
        match self {
            Builtin::Out => "Out",
            Builtin::In => "In",
            Builtin::TudaSyuda => "TudaSyuda",
            Builtin::Max => ">>>",
            Builtin::Min => "<<<",
        }
    }

    /// Accepted argument counts.
    pub fn arity(self) -> RangeInclusive<u8> {
        match self {
            Builtin::Out => 1..=1,
            Builtin::In => 0..=0,
            Builtin::TudaSyuda => 3..=4,
            Builtin::Max | Builtin::Min => 2..=2,
        }
    }
}

pub struct BuiltinRegistry {
    builtins: HashMap<&'static str, Builtin>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        let mut builtins = HashMap::new();

        for builtin in [
            Builtin::Out,
            Builtin::In,
            Builtin::TudaSyuda,
            Builtin::Max,
            Builtin::Min,
        ] {
            builtins.insert(builtin.member(), builtin);
        }

        Self { builtins }
    }

    pub fn lookup(&self, member: &str) -> Option<Builtin> {
        self.builtins.get(member).copied()
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}
