// Aggregates all former standalone integration tests as modules.
mod installer;
mod routing;
mod transactions;
