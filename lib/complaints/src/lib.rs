//! Complaint domain for urbansetu.
//!
//! - `Complaint`, `ComplaintStatus`, `Priority`: rows of the `complaints` table
//! - `Timeline`: the progress history derived from a complaint's status
//! - `ComplaintDesk`: admin review (reporter lookup, status changes)
//! - `ComplaintStore`: the storage seam, implemented over HTTP elsewhere

pub mod desk;
pub mod error;
pub mod model;
pub mod store;
pub mod timeline;

pub use desk::{ComplaintDesk, ComplaintDetail, ReporterContact};
pub use error::ComplaintError;
pub use model::{Complaint, ComplaintStatus, Priority};
pub use store::ComplaintStore;
pub use timeline::{Stage, Timeline, TimelineEntry, timeline};
