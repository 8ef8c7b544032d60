pub mod arrivals;
pub mod census;
pub mod patient_flow;
