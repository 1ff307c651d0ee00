pub mod account;
pub mod bootstrap;
pub mod commands;
pub mod lockout;
pub mod scheduled;
pub mod session;
pub mod store;
pub mod task_list;
