//! Course timetable assembly for a university timetable planner.
//!
//! [`course`] holds course values and conflict detection, [`timetable`] the
//! conflict-free assembler with its grid and save projections, [`generation`]
//! consumes the external candidate generator, and [`session`] ties one
//! timetable to one user. [`server`] exposes sessions over HTTP.

pub mod client;
pub mod config;
pub mod course;
pub mod error;
pub mod generation;
pub mod server;
pub mod session;
pub mod timetable;
pub mod types;

pub use course::{conflicts_with, Course, CourseRecord, ScheduleEntry, Weekday};
pub use error::PlannerError;
pub use timetable::Timetable;
