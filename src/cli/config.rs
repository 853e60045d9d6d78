use anyhow::Result;
use clap::Args;

use crate::cli::runtime::LoadedConfig;

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Also print the resolved provider endpoints
    #[arg(long)]
    pub endpoints: bool,
}

pub fn cmd_config(args: ConfigArgs, loaded: &LoadedConfig) -> Result<()> {
    if loaded.from_file {
        println!("# loaded from {}", loaded.path.display());
    } else {
        println!("# defaults ({} not found)", loaded.path.display());
    }
    print!("{}", serde_yaml::to_string(&loaded.config)?);

    if args.endpoints {
        let profile = loaded.config.provider_profile()?;
        println!();
        println!("# provider '{}' endpoints, in failover order", profile.name);
        for (index, endpoint) in profile.endpoints.iter().enumerate() {
            println!("# {}. {}", index + 1, endpoint);
        }
    }
    Ok(())
}
