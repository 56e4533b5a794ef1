use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// EAPI the atom grammar is checked against
///
/// `Any` accepts every clause the parser understands. A numbered EAPI
/// switches on the restrictions of that EAPI; repository deps are never
/// part of a numbered EAPI.
///
/// See [PMS 8.3](https://projects.gentoo.org/pms/latest/pms.html#package-dependency-specifications).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Eapi {
    /// No EAPI restriction.
    #[default]
    Any,
    /// A specific numbered EAPI.
    Numbered(u32),
}

impl Eapi {
    /// `!!` strong blockers, EAPI 2 and later.
    pub fn allows_strong_blockers(self) -> bool {
        !matches!(self, Eapi::Numbered(0 | 1))
    }

    /// `:slot` deps, EAPI 1 and later.
    pub fn allows_slot_deps(self) -> bool {
        self != Eapi::Numbered(0)
    }

    /// `[use]` deps, EAPI 2 and later.
    pub fn allows_use_deps(self) -> bool {
        !matches!(self, Eapi::Numbered(0 | 1))
    }

    /// `::repo` deps are an extension no numbered EAPI carries.
    pub fn allows_repo_deps(self) -> bool {
        self == Eapi::Any
    }

    pub fn allows_multiple_slots(self) -> bool {
        self == Eapi::Any
    }

    /// `:=`, `:*` and `:slot/subslot`, EAPI 5 and later.
    pub fn allows_slot_operators(self) -> bool {
        match self {
            Eapi::Any => true,
            Eapi::Numbered(n) => n >= 5,
        }
    }
}

impl From<u32> for Eapi {
    fn from(n: u32) -> Self {
        Eapi::Numbered(n)
    }
}

impl From<Option<u32>> for Eapi {
    fn from(n: Option<u32>) -> Self {
        n.map_or(Eapi::Any, Eapi::Numbered)
    }
}

impl fmt::Display for Eapi {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Eapi::Any => write!(f, "any"),
            Eapi::Numbered(n) => write!(f, "{}", n),
        }
    }
}

impl FromStr for Eapi {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "" | "any" => Ok(Eapi::Any),
            _ => s
                .parse::<u32>()
                .map(Eapi::Numbered)
                .map_err(|_| Error::InvalidEapi(s.to_string())),
        }
    }
}
