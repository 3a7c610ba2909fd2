//! Auth-domain identifiers, signing keys, claims, and issued token models.

pub mod bearer;
pub mod id;
pub mod key;
pub mod token;

pub use bearer::*;
pub use id::*;
pub use key::*;
pub use token::{claims::*, pair::*, secret::*};
