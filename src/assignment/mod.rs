//! Assignment coordination
//!
//! Three entry points (manual assign, self-claim, freelancer response) plus
//! automatic post-payment matching, all converging on one invariant: at
//! most one freelancer ever holds a booking's freelancer_id, and the
//! transition into that state is atomic against concurrent attempts.

pub mod model;
pub mod service;

pub use model::{Assignment, AssignmentStatus, RespondAction};
pub use service::AssignmentService;
