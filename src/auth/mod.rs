pub mod password;
pub mod session;

pub use password::{DEFAULT_ITERATIONS, hash_password, verify_password};
pub use session::{CurrentUser, OptionalUser, SESSION_COOKIE};
