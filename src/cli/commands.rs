//! Subcommand execution.

use super::args::{Args, Command};
use crate::devtool::{Dispatcher, ToolRequest, catalog};
use crate::docker::{DockerCli, ImageStrategy};
use crate::exec::ProcessRunner;
use crate::error::Result;
use crate::platform;
use std::collections::BTreeMap;

/// Execute the parsed command
pub async fn execute_command(args: Args) -> Result<()> {
    let config = args.config();
    let manifest = args.manifest_source()?;
    let dispatcher = Dispatcher::docker(config).with_manifest(manifest);

    log::debug!("executing '{}'", args.command.name());

    match args.command {
        Command::Run {
            tool,
            workdir,
            env,
            args,
            force_container: _,
        } => {
            let request = ToolRequest::new(args)
                .with_env(env.into_iter().collect::<BTreeMap<_, _>>())
                .with_workdir(workdir.unwrap_or_default());
            dispatcher.run(&tool, request).await
        }

        Command::EnsureImage { tool } => {
            DockerCli::new(ProcessRunner::new(dispatcher.config().verbose))
                .check_available()
                .await?;

            let image = dispatcher
                .images()
                .ensure_image(&tool, dispatcher.manifest(), strategy_for(&tool))
                .await
                .map_err(|e| e.context(format!("{}: ensure image", tool)))?;
            println!("{}", image);
            Ok(())
        }

        Command::SelectStage { tool } => {
            let text = dispatcher.manifest().text()?;
            let stage = platform::select_stage(&tool, text, &dispatcher.config().host_arch)?;
            println!("{}", stage);
            Ok(())
        }

        Command::CheckVersion { tool } => {
            let spec = catalog::lookup(&tool)?;
            dispatcher.version_ok(&spec).await.map_err(|e| e.context(tool.clone()))?;
            println!("{}: installed version satisfies the manifest pin", tool);
            Ok(())
        }

        Command::ImageName { tool } => {
            let image = dispatcher
                .images()
                .image_reference(&tool, dispatcher.manifest(), strategy_for(&tool))?;
            println!("{}", image);
            Ok(())
        }

        Command::Tools => {
            for spec in catalog::all() {
                let version = dispatcher
                    .manifest()
                    .tool(spec.name)
                    .map(|d| d.version)
                    .unwrap_or_else(|_| "-".to_string());
                let policy = match &spec.native {
                    Some(native) => format!("{} ({})", native.binary, native.rule),
                    None => "container only".to_string(),
                };
                println!("{:<16} {:<10} {}", spec.name, version, policy);
            }
            Ok(())
        }
    }
}

/// Image strategy of a built-in tool.
///
/// Tools outside the catalog can still be built from a custom manifest.
fn strategy_for(tool: &str) -> ImageStrategy {
    catalog::lookup(tool)
        .map(|spec| spec.image)
        .unwrap_or(ImageStrategy::Build)
}
