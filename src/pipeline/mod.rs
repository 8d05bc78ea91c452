pub mod cancel;
pub mod job_runner;
pub mod naming;
pub mod orchestrator;
pub mod output;
pub mod sink;
