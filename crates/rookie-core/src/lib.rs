// Library root: feature contract, data preparation, model pipeline and
// artifact persistence shared by the trainer and the prediction server.

pub mod artifact;
pub mod config;
pub mod dataset;
pub mod features;
pub mod model;
pub mod training;
