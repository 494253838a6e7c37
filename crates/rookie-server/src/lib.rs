// Prediction server library: request schema, service object and routes.
// Exposed as a library so integration tests can drive the router directly.

pub mod routes;
pub mod schema;
pub mod service;
