pub mod compress;

mod dispatch;
pub use dispatch::{Cluster, CommandOutput, Executor, ProcessExecutor, Reach, RemoteOutput, Target};

pub mod helper;
pub mod plugin;
pub use plugin::{Plugin, PluginConfig};

pub mod shell;
