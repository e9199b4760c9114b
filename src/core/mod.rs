pub mod arguments;
pub mod dispatch;
pub mod fleet;
pub mod pending;
pub mod protocol;
pub mod registry;
pub mod session;

pub use arguments::{coerce_arguments, ArgumentRecovery, FragmentMerge, NoRecovery, ToolArguments};
pub use fleet::{
    function_name, FleetManager, ProviderStatus, SessionConnector, ToolOwner, ToolSession,
    TransportSessionConnector,
};
pub use pending::PendingCalls;
pub use protocol::{InboundMessage, PeerInfo, VisionCapability};
pub use registry::{sanitize_tool_name, FunctionDescriptor, InputSchema, Tool, ToolRegistry};
pub use session::{McpSession, SessionPhase, DEFAULT_CALL_TIMEOUT};
