//! Gentoo package atom parser and restriction builder based on [PMS]
//!
//! This crate parses dependency atoms as written in ebuilds and profiles,
//! validates them against an EAPI, and derives the list of restrictions a
//! package has to satisfy to match the atom.
//!
//! [PMS]: https://projects.gentoo.org/pms/latest/pms.html
//!
//! # Examples
//!
//! Parse an atom:
//! ```
//! use ebuild_atom::{Atom, Operator};
//!
//! let atom = Atom::parse(">=dev-lang/rust-1.75.0:0[llvm_targets_AMDGPU]").unwrap();
//! assert_eq!(atom.key(), "dev-lang/rust");
//! assert_eq!(atom.op(), Some(Operator::GreaterOrEqual));
//! assert_eq!(atom.fullver(), Some("1.75.0"));
//! assert_eq!(atom.slot().unwrap(), ["0"]);
//! ```
//!
//! Validate against an EAPI:
//! ```
//! use ebuild_atom::AtomParser;
//!
//! let err = AtomParser::new().eapi(1u32).parse("dev-lang/rust[ssl]").unwrap_err();
//! assert_eq!(err.reason().unwrap().to_string(), "use deps aren't allowed in eapi 1");
//! ```
//!
//! Derive restrictions:
//! ```
//! use ebuild_atom::{Atom, Attr, Restriction, ValueRestriction};
//!
//! let atom = Atom::parse("dev-lang/rust[-debug]").unwrap();
//! let restrictions = atom.restrictions().unwrap();
//! assert_eq!(
//!     restrictions.last(),
//!     Some(&Restriction::Package {
//!         attr: Attr::Use,
//!         value: ValueRestriction::Containment {
//!             values: vec!["debug".to_string()],
//!             all: true,
//!             negate: true,
//!         },
//!     })
//! );
//! ```

mod atom;
mod cpn;
mod cpv;
mod eapi;
mod error;
mod repo;
mod restrict;
mod slot;
mod use_dep;
mod version;

// Re-export main types
pub use atom::{Atom, AtomParser, Blocker};
pub use cpn::Cpn;
pub use cpv::{Cpv, CpvFields, CpvParser, PmsCpvParser};
pub use eapi::Eapi;
pub use error::{Error, Malformed, Result};
pub use restrict::{Attr, Descriptors, Restriction, RestrictionFactory, ValueRestriction, VersionMatch};
pub use slot::SlotOperator;
pub use use_dep::{UseDep, UseDepKind, UseStyle};
pub use version::{Operator, Revision, Suffix, SuffixKind, Version};
