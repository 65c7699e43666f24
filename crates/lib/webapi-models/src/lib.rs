//! Data contract for the OHDSI WebAPI.
//!
//! `models` holds the records returned by the remote service; `schema` holds the
//! typed cohort-expression schema used to assemble and validate cohort JSON.

pub mod models;
pub mod schema;
