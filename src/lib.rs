//! Site Layout - constraint-aware placement of site assets with graded access roads

pub mod constraints;
pub mod core;
pub mod layout;
pub mod navigation;
pub mod optimizer;
pub mod roads;
pub mod site;
pub mod spatial;
