pub mod capture;
pub mod control;
pub mod errors;
pub mod models;
pub mod permissions;
pub mod settings;
pub mod trainer;
