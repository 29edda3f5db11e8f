pub mod rest;

pub use rest::ClinicDbClient;
