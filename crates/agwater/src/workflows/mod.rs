pub mod lab_results;
pub mod water_assessment;
