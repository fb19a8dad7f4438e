// Domain layer: wire models and ports (interfaces) of the cohort engine API.

pub mod model;
pub mod ports;
