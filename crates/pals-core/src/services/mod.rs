//! Application services shared by every client

mod tracker;

pub use tracker::TrackerService;
