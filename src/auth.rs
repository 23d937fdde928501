//! Auth-domain identifiers, principal/operation/access models, and bearer token validation.

pub mod access;
pub mod id;
pub mod operation;
pub mod principal;
pub mod token;
pub mod validator;

pub use access::*;
pub use id::*;
pub use operation::*;
pub use principal::*;
pub use token::secret::*;
pub use validator::*;
