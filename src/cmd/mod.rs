mod kubetoken;
mod logs;

pub use kubetoken::{KubetokenArgs, KubetokenCmd};
pub use logs::{LogsArgs, LogsCmd};
