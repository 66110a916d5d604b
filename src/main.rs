fn main() -> anyhow::Result<()> {
    // Set up the tokio runtime
    let runtime = tokio::runtime::Runtime::new()?;

    // Block on the async run function
    runtime.block_on(accesscontrol_lib::run())
}
