pub mod lockout;
pub mod models;
pub mod routes;
