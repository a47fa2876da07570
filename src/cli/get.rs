//! Get command handler.

use color_eyre::Result;

use super::App;

impl App {
    /// Resolve `key` from `node` and print the value.
    pub fn run_get(&self, node: &str, key: &str) -> Result<()> {
        let ctx = self.load_context()?;
        let service = ctx.resolve(node, key)?;
        tracing::debug!(node = %node, key = %key, "Resolved service");
        println!("{}", service);
        Ok(())
    }
}
