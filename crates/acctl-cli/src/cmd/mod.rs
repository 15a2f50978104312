pub mod provision;
pub mod reassign;
pub mod reclaim;
pub mod separate;
