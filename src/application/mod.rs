pub mod exporter;
pub mod orchestrator;
pub mod runtime;
pub mod session_scope;

#[cfg(test)]
pub(crate) mod test_support;
