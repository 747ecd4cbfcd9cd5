pub mod aggregate;
pub mod drawdown;
#[cfg(all(feature = "var_es", feature = "attribution"))]
pub mod stress;
