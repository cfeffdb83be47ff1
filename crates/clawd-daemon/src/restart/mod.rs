mod policy;
mod tracker;

pub use policy::RestartPolicy;
pub use tracker::RestartTracker;
