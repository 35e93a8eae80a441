pub mod path_planning_service;
pub mod planning_worker;
pub mod task_channel;

pub use path_planning_service::*;
pub use planning_worker::*;
pub use task_channel::*;
