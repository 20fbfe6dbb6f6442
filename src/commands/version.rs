use anyhow::Result;

pub fn execute() -> Result<()> {
    println!("ddmon version {}", env!("CARGO_PKG_VERSION"));
    Ok(())
}
