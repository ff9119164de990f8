//! # terralink Algorithms
//!
//! Pipeline stages for the terralink geospatial linkage pipeline.
//!
//! ## Available stages
//!
//! - **reproject**: CRS transformation (WGS84 ↔ UTM / Web Mercator)
//! - **relate**: spatial predicates, filter, attribute joins, k-nearest
//! - **aggregate**: buffers, area-weighted and count aggregation
//! - **interpolation**: IDW, variogram fitting, ordinary kriging

pub mod aggregate;
pub mod interpolation;
mod maybe_rayon;
pub mod relate;
pub mod reproject;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::aggregate::{
        area_weighted_aggregate, buffer, count_aggregate, AggregateRow, BufferParams,
    };
    pub use crate::interpolation::{
        empirical_variogram, estimate, fit_best_variogram, fit_variogram, idw, ordinary_kriging,
        samples_from, EmpiricalVariogram, Estimator, FittedVariogram, IdwParams, KrigingParams,
        SamplePoint, VariogramModel, VariogramParams,
    };
    pub use crate::relate::{
        filter, join, join_required, nearest, JoinCardinality, NeighborHit, SpatialPredicate,
    };
    pub use crate::reproject::{reproject, transform_point};
    pub use terralink_core::prelude::*;
}
