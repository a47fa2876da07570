//! Show command handler.

use color_eyre::Result;

use super::App;

impl App {
    /// Print the tree snapshot as pretty JSON.
    pub fn run_show(&self) -> Result<()> {
        let ctx = self.load_context()?;
        println!("{}", serde_json::to_string_pretty(&ctx.snapshot())?);
        Ok(())
    }
}
