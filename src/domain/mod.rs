// Domain layer: catalog, models, query description and ports. No HTTP here.

pub mod catalog;
pub mod model;
pub mod ports;
pub mod query;
