// Binance REST endpoints and their payloads.
pub mod binance {
    // Calls to the public market data endpoints.
    pub mod api_caller;
    // Response structures.
    pub mod response;
}
// HTTP plumbing.
pub mod http {
    // GET with status classification.
    pub mod client;
    // Backoff for transient failures.
    pub mod retry;
}
// Output storage.
pub mod store {
    /// CSV output file.
    pub mod csv_file;
}
// Settings from the environment.
pub mod config;
// User date parsing and rendering.
pub mod dates;
// CLI download flow.
pub mod download;
// Paginated range fetch.
pub mod fetcher;
// Data models.
pub mod model;
