use std::net::SocketAddr;

/// A running environment that hosts a shell server for one analysis, such as
/// a container booted from the project's image.
pub trait ExecutionEnvironment: Send {
    /// Where the environment's shell server is reachable.
    fn server_addr(&self) -> SocketAddr;

    /// Stop the environment, leaving it around for inspection.
    fn stop(&mut self) -> anyhow::Result<()>;

    /// Remove the environment entirely.
    fn remove(&mut self) -> anyhow::Result<()>;
}

/// Provisions execution environments. Implementations talk to whatever hosts
/// the environment (a container engine, a VM, a remote box); this crate only
/// depends on the interface.
pub trait EnvironmentProvisioner: Send + Sync {
    /// Boot an environment prepared for the given document's project and
    /// wait until its shell server accepts connections.
    fn start_environment(&self, document: &str) -> anyhow::Result<Box<dyn ExecutionEnvironment>>;
}
