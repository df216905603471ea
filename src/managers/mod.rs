pub mod dispatcher;
pub mod hooks;
pub mod logging;
pub mod restore;
pub mod scheduler;
