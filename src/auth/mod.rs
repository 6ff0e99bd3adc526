mod session;
pub mod middleware;

pub use middleware::{current_user, extract_session_id, require_admin, SESSION_COOKIE};
pub use session::{Session, SessionStore, SessionUser};
