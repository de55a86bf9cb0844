mod job;
mod state;

pub use job::{Job, JobStatus, JobTicket};
pub use state::{StateMachine, Transition};
