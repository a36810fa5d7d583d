#![forbid(unsafe_code)]

pub mod work_item;
pub use work_item::{RoleId, WorkItem};
