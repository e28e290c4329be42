//! `sam config` — Print the effective configuration.

use sam_config::SamConfig;

pub fn show(config: &SamConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("# {}", SamConfig::config_dir().join("config.toml").display());
    print!("{}", config.to_toml()?);
    Ok(())
}
