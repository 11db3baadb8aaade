use eyre::Result;

/// HttpServer defines the port (interface) for a listener that serves until stopped
pub trait HttpServer: Send + 'static {
    /// Run the HTTP server
    ///
    /// # Returns
    /// A future that resolves when the server shuts down or encounters an error
    fn run(self) -> impl std::future::Future<Output = Result<()>> + Send;
}
