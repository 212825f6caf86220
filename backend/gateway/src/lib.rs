pub mod http;
pub mod origin;
pub mod rpc;
pub mod shutdown;
pub mod stdio;

use std::sync::Arc;

use vigil_config::Config;
use vigil_core::{Metrics, ToolRegistry};

/// Shared state for both stateless bindings.
#[derive(Clone)]
pub struct GatewayState {
    pub tools: Arc<ToolRegistry>,
    pub metrics: Arc<Metrics>,
    pub config: Arc<Config>,
}

pub use shutdown::Shutdown;
