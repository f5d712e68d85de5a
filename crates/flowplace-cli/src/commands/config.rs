use flowplace_core::FlowplaceConfig;

pub fn print_default() -> anyhow::Result<()> {
    print!("{}", FlowplaceConfig::default().to_toml_string()?);
    Ok(())
}
