mod scheduler;

pub use scheduler::{task_fn, Scheduler, TaskFn};
