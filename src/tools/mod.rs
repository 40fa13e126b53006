//! 工具目录：本地固定工具 + 远程发现工具（仅描述，不在本进程执行）

pub mod builtin;
pub mod registry;
pub mod remote;

pub use registry::{ToolCatalog, ToolDescriptor};
pub use remote::{assemble_tools, ToolSet};
