//! Configuration file commands.

use crate::config::{self, Config};

/// Print the active configuration, or write a default file with `init`.
pub fn cmd_config(init: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if init {
        if let Some(existing) = &path
            && existing.exists()
        {
            println!("Config already exists at {}", existing.display());
            return Ok(());
        }
        let written = config::save(&Config::default())?;
        println!("Wrote default config to {}", written.display());
        return Ok(());
    }

    match &path {
        Some(p) if p.exists() => println!("# {}", p.display()),
        Some(p) => println!("# {} (not found, showing defaults)", p.display()),
        None => println!("# No config directory, showing defaults"),
    }
    print!("{}", toml::to_string_pretty(&config::load())?);
    Ok(())
}
