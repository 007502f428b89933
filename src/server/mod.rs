//! Web control panel: a thin job-status façade over one background crawl.
//!
//! - [`supervisor`]: single active run, status snapshots, bounded log, stop
//! - [`routes`]: axum router and server loop

pub mod routes;
pub mod supervisor;

pub use routes::serve;
pub use supervisor::RunSupervisor;
