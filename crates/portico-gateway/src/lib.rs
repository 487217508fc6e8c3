// ===== Core gateway modules =====
pub mod aggregate;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod mock;
pub mod proxy;
pub mod registry;

// ===== Hosting & observability =====
pub mod metrics;
pub mod response;
pub mod server;

#[cfg(test)]
mod test_support;
