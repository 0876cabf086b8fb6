//! The stdio MCP surface: `laminark-daemon`'s request loop. Registers
//! `recall`, `save_memory`, `discover_tools`, `graph_stats`, and
//! `query_graph` as MCP tools over a single project fingerprint fixed at
//! construction.

pub mod server;
pub mod tools;

pub use server::LaminarkServer;
