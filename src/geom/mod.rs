/// Scale/residual transform decomposition.
pub mod decompose;
/// Rectangle helpers.
pub mod region;
