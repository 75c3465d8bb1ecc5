// Alternative execution paths for the poll loop.

pub mod async_scheduler;
