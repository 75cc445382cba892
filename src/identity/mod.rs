//! Authentication and authorization core: password hashing, the signed
//! session token service, and the role gate every protected handler runs.
//! Keep the public surface thin and split implementation across sub-modules.

mod guard;
mod password;
mod token;

pub use guard::{authorize, parse_cookie, AUTH_COOKIE};
pub use password::{hash_password, hash_password_blocking, verify_password, verify_password_blocking};
pub use token::{Claims, TokenService};
