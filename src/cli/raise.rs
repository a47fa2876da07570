//! Raise command handler.

use color_eyre::Result;
use serde_json::json;

use super::App;

impl App {
    /// Raise `key` from `node`, then print the depth and the resulting tree.
    pub fn run_raise(&self, node: &str, key: &str, force: bool) -> Result<()> {
        let ctx = self.load_context()?;
        let safe = if force { Some(false) } else { None };
        let depth = ctx.raise(node, key, safe)?;

        let output = json!({
            "node": node,
            "key": key,
            "depth": depth,
            "tree": ctx.snapshot(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}
